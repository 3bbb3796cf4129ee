use std::time::Duration;

use nxtspp_client::{MotorController, NxtMotorController};
use nxtspp_command::{CommandFrame, MotorState};
use tracing::info;

use crate::cmd::link::Link;
use crate::cmd::{parse_duration, ConnectArgs, MotorCmdArgs};
use crate::exit::{client_error, command_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: MotorCmdArgs, format: OutputFormat) -> CliResult<i32> {
    let flush_timeout = parse_duration(&args.flush_timeout)?;
    send_state(&args.connect, &args.motor.to_state(), flush_timeout, format)
}

/// Validate `state`, connect, send it and wait for the write before closing.
pub(crate) fn send_state(
    connect: &ConnectArgs,
    state: &MotorState,
    flush_timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    // Reject bad input before touching the radio.
    let frame =
        CommandFrame::from_state(state).map_err(|err| command_error("invalid motor state", err))?;

    let link = Link::open(connect)?;
    let controller = NxtMotorController::new(link.manager());
    controller
        .set_motor_state(state)
        .map_err(|err| client_error("send failed", err))?;
    link.manager()
        .flush(flush_timeout)
        .map_err(|err| client_error("flush failed", err))?;
    info!(address = %connect.address, motor = state.motor, power = state.power, "motor command sent");

    link.close();
    print_frames(&[frame], format);
    Ok(SUCCESS)
}
