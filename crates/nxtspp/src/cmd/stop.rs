use nxtspp_command::motor::motor_name;
use tracing::debug;

use crate::cmd::motor::send_state;
use crate::cmd::{parse_duration, StopArgs};
use crate::exit::CliResult;
use crate::output::OutputFormat;

pub fn run(args: StopArgs, format: OutputFormat) -> CliResult<i32> {
    let flush_timeout = parse_duration(&args.flush_timeout)?;
    debug!(motor = motor_name(args.motor), brake = args.brake, "stopping");
    send_state(&args.connect, &args.to_state(), flush_timeout, format)
}
