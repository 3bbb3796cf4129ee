//! Byte-stream endpoint abstraction for Bluetooth serial links.
//!
//! Provides the lowest layer of nxtspp:
//! - Device address and service UUID types
//! - The [`ByteStream`] / [`Connector`] traits every session is built on
//! - RFCOMM sockets on Linux (BlueZ)
//!
//! Discovery and pairing are left to the platform. A connector only needs to
//! turn an address plus service UUID into an open, bidirectional stream.

pub mod abort;
pub mod address;
pub mod error;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod rfcomm;

pub use abort::AbortSignal;
pub use address::{DeviceAddress, ServiceUuid};
pub use error::{Result, TransportError};
pub use traits::{ByteStream, Connector};

#[cfg(target_os = "linux")]
pub use rfcomm::{RfcommConnector, RfcommStream};
