use std::time::Duration;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The operation needs an established connection.
    #[error("not connected")]
    NotConnected,

    /// Fewer bytes are buffered than were requested.
    #[error("insufficient data: requested {requested} bytes, {available} available")]
    InsufficientData { requested: usize, available: usize },

    /// A motor state failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] nxtspp_command::CommandError),

    /// Opening, reading or writing the stream failed.
    #[error("stream error: {0}")]
    Stream(#[from] nxtspp_transport::TransportError),

    /// The outbound queue cannot take the whole write.
    #[error("outbound queue full ({capacity} bytes)")]
    QueueFull { capacity: usize },

    /// A bounded wait expired.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The session was already closed.
    #[error("already closed")]
    AlreadyClosed,

    /// A background task could not be started.
    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;
