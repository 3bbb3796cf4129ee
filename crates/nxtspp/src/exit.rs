use std::fmt;
use std::io;

use nxtspp_client::ClientError;
use nxtspp_command::CommandError;
use nxtspp_transport::TransportError;

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::NotConnected => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::InvalidAddress { .. } | TransportError::InvalidUuid { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        TransportError::Aborted => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn command_error(context: &str, err: CommandError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Stream(err) => transport_error(context, err),
        ClientError::InvalidArgument(err) => command_error(context, err),
        ClientError::InsufficientData { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ClientError::NotConnected | ClientError::AlreadyClosed | ClientError::QueueFull { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn invalid_motor_is_data_invalid() {
        let err = client_error(
            "send failed",
            ClientError::InvalidArgument(CommandError::InvalidMotor(7)),
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("send failed: "));
    }

    #[test]
    fn refused_open_is_transport_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Open {
                address: "00:16:53:00:00:01".parse().unwrap(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn flush_timeout_maps_to_timeout() {
        let err = client_error("flush failed", ClientError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
    }
}
