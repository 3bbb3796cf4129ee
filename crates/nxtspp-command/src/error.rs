/// Errors that can occur while encoding or inspecting command frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The motor id is not a port (0, 1, 2) or the all-motors sentinel.
    #[error("invalid motor {0:#04x} (expected 0, 1, 2 or 0xff)")]
    InvalidMotor(u8),

    /// The power is outside -100..=100.
    #[error("invalid power {0} (expected -100..=100)")]
    InvalidPower(i8),

    /// Bytes that do not form a SETOUTPUTSTATE frame.
    #[error("invalid command frame: {0}")]
    InvalidFrame(&'static str),
}

impl CommandError {
    /// Whether this error rejects a caller-supplied argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidMotor(_) | Self::InvalidPower(_))
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
