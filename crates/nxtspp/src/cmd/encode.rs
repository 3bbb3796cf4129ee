use nxtspp_command::CommandFrame;

use crate::cmd::EncodeArgs;
use crate::exit::{command_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = CommandFrame::from_state(&args.motor.to_state())
        .map_err(|err| command_error("invalid motor state", err))?;
    print_frames(&[frame], format);
    Ok(SUCCESS)
}
