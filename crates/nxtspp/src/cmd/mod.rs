use std::time::Duration;

use clap::{Args, Subcommand};
use nxtspp_command::motor::parse_motor;
use nxtspp_command::MotorState;
use nxtspp_transport::{DeviceAddress, ServiceUuid};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod link;
pub mod listen;
pub mod motor;
pub mod stop;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a motor state and print the frame (no connection).
    Encode(EncodeArgs),
    /// Connect, send one motor state and disconnect.
    Motor(MotorCmdArgs),
    /// Connect and stop a motor (or all motors).
    Stop(StopArgs),
    /// Connect and print received bytes.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Motor(args) => motor::run(args, format),
        Command::Stop(args) => stop::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Fields of one motor state.
#[derive(Args, Debug, Clone)]
pub struct MotorArgs {
    /// Motor port: a, b, c or all.
    #[arg(long, short = 'm', default_value = "a", value_parser = parse_motor_arg)]
    pub motor: u8,
    /// Power from -100 to 100; 0 stops the motor.
    #[arg(long, short = 'p', default_value_t = 0, allow_hyphen_values = true)]
    pub power: i8,
    /// Brake instead of coasting.
    #[arg(long)]
    pub brake: bool,
    /// Regulate speed under load.
    #[arg(long)]
    pub regulate: bool,
    /// Synchronise with these motors (comma-separated).
    #[arg(long, value_delimiter = ',', value_parser = parse_motor_arg)]
    pub sync: Vec<u8>,
    /// Turn ratio while synchronised.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub turn_ratio: i8,
    /// Encoder counts before stopping; 0 runs forever.
    #[arg(long, default_value_t = 0)]
    pub tacho_limit: u32,
}

impl MotorArgs {
    pub fn to_state(&self) -> MotorState {
        let mut state =
            MotorState::new(self.motor, self.power).with_tachometer_limit(self.tacho_limit);
        if self.brake {
            state = state.with_brake();
        }
        if self.regulate {
            state = state.with_speed_regulation();
        }
        if !self.sync.is_empty() {
            state = state.with_sync(&self.sync, self.turn_ratio);
        }
        state
    }
}

/// Where and how to connect.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Device address (XX:XX:XX:XX:XX:XX).
    pub address: DeviceAddress,
    /// Service UUID to connect to.
    #[arg(long, default_value_t = ServiceUuid::SERIAL_PORT)]
    pub service: ServiceUuid,
    /// RFCOMM channel the service listens on.
    #[arg(long, default_value_t = 1)]
    pub channel: u8,
    /// Connect timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub motor: MotorArgs,
}

#[derive(Args, Debug)]
pub struct MotorCmdArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    #[command(flatten)]
    pub motor: MotorArgs,
    /// Maximum time to wait for the command to be written (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub flush_timeout: String,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Motor port: a, b, c or all.
    #[arg(long, short = 'm', default_value = "all", value_parser = parse_motor_arg)]
    pub motor: u8,
    /// Brake instead of coasting.
    #[arg(long)]
    pub brake: bool,
    /// Maximum time to wait for the command to be written (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub flush_timeout: String,
}

impl StopArgs {
    pub fn to_state(&self) -> MotorState {
        if self.brake {
            MotorState::brake(self.motor)
        } else {
            MotorState::stop(self.motor)
        }
    }

}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after receiving N bytes.
    #[arg(long)]
    pub count: Option<usize>,
    /// How often to check for received bytes (e.g. 50ms).
    #[arg(long, default_value = "50ms")]
    pub poll_interval: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_motor_arg(input: &str) -> Result<u8, String> {
    parse_motor(input).ok_or_else(|| format!("unknown motor '{input}' (expected a, b, c or all)"))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
