use crate::address::{DeviceAddress, ServiceUuid};

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The input is not a `XX:XX:XX:XX:XX:XX` device address.
    #[error("invalid device address: {input:?}")]
    InvalidAddress { input: String },

    /// The input is not a canonical 128-bit UUID.
    #[error("invalid service uuid: {input:?}")]
    InvalidUuid { input: String },

    /// No RFCOMM channel is known for the requested service.
    #[error("no rfcomm channel registered for service {0}")]
    UnknownService(ServiceUuid),

    /// Failed to open a stream to the device.
    #[error("failed to open stream to {address}: {source}")]
    Open {
        address: DeviceAddress,
        source: std::io::Error,
    },

    /// The open attempt was aborted before it completed.
    #[error("connection attempt aborted")]
    Aborted,

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is not available on this platform.
    #[error("transport unsupported: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, TransportError>;
