use std::fmt;
use std::io::{Read, Write};

use crate::abort::AbortSignal;
use crate::address::{DeviceAddress, ServiceUuid};
use crate::error::Result;

/// An open, bidirectional byte stream to a peer device.
///
/// Reads block until data arrives, the peer closes the link (`Ok(0)`), or the
/// stream is shut down. A session keeps one handle per background task, so
/// every implementation must be cloneable onto the same underlying link.
pub trait ByteStream: Read + Write + Send + fmt::Debug {
    /// Create an independent handle onto the same connection.
    fn try_clone(&self) -> Result<Box<dyn ByteStream>>;

    /// Shut the connection down in both directions.
    ///
    /// A read blocked on any handle of this connection must return (EOF or
    /// error) once this is called.
    fn shutdown(&self) -> Result<()>;
}

/// Opens byte streams to devices by address and service UUID.
///
/// This is the seam to the platform Bluetooth stack. Discovery and pairing
/// happen elsewhere; a connector is handed an already-known address.
pub trait Connector: Send + Sync {
    /// Open a stream to `address`, resolving `uuid` to a service (blocking).
    ///
    /// Implementations register a hook on `abort` that interrupts the
    /// blocking open, and return [`TransportError::Aborted`] when it fires.
    ///
    /// [`TransportError::Aborted`]: crate::TransportError::Aborted
    fn open(
        &self,
        address: &DeviceAddress,
        uuid: &ServiceUuid,
        abort: &AbortSignal,
    ) -> Result<Box<dyn ByteStream>>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

#[cfg(unix)]
impl ByteStream for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> Result<Box<dyn ByteStream>> {
        let cloned = std::os::unix::net::UnixStream::try_clone(self)?;
        Ok(Box::new(cloned))
    }

    fn shutdown(&self) -> Result<()> {
        match std::os::unix::net::UnixStream::shutdown(self, std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already disconnected by the peer.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
