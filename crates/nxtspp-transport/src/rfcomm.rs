use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::{debug, info};

use crate::abort::AbortSignal;
use crate::address::{DeviceAddress, ServiceUuid};
use crate::error::{Result, TransportError};
use crate::traits::{ByteStream, Connector};

/// `BTPROTO_RFCOMM` from `<bluetooth/bluetooth.h>`.
const BTPROTO_RFCOMM: libc::c_int = 3;

/// `struct sockaddr_rc` from `<bluetooth/rfcomm.h>`.
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    /// `bdaddr_t`, least-significant byte first.
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// RFCOMM connector over BlueZ sockets.
///
/// Services are resolved to RFCOMM channels from a local table rather than by
/// SDP browsing; Serial Port Profile maps to channel 1 by default, which is
/// where LEGO NXT bricks listen.
#[derive(Debug, Clone)]
pub struct RfcommConnector {
    channels: HashMap<ServiceUuid, u8>,
}

impl RfcommConnector {
    /// Default RFCOMM channel for the Serial Port Profile.
    pub const DEFAULT_SPP_CHANNEL: u8 = 1;

    /// Create a connector that knows only the Serial Port Profile.
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        channels.insert(ServiceUuid::SERIAL_PORT, Self::DEFAULT_SPP_CHANNEL);
        Self { channels }
    }

    /// Override the channel used for the Serial Port Profile.
    pub fn with_default_channel(self, channel: u8) -> Self {
        self.with_service_channel(ServiceUuid::SERIAL_PORT, channel)
    }

    /// Register the RFCOMM channel that serves `uuid`.
    pub fn with_service_channel(mut self, uuid: ServiceUuid, channel: u8) -> Self {
        self.channels.insert(uuid, channel);
        self
    }

    /// The channel registered for `uuid`, if any.
    pub fn channel_for(&self, uuid: &ServiceUuid) -> Option<u8> {
        self.channels.get(uuid).copied()
    }
}

impl Default for RfcommConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for RfcommConnector {
    fn open(
        &self,
        address: &DeviceAddress,
        uuid: &ServiceUuid,
        abort: &AbortSignal,
    ) -> Result<Box<dyn ByteStream>> {
        let channel = self
            .channel_for(uuid)
            .ok_or(TransportError::UnknownService(*uuid))?;
        let open_err = |source: io::Error| TransportError::Open {
            address: *address,
            source,
        };

        // SAFETY: plain socket(2) call; the returned descriptor is checked
        // before being wrapped.
        let raw = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if raw < 0 {
            return Err(open_err(io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let hook_fd = fd.try_clone().map_err(open_err)?;
        abort.on_abort(move || {
            // SAFETY: `hook_fd` is owned by this closure and still open.
            unsafe {
                libc::shutdown(hook_fd.as_raw_fd(), libc::SHUT_RDWR);
            }
        });

        let mut bdaddr = address.octets();
        bdaddr.reverse();
        let sockaddr = SockaddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: bdaddr,
            rc_channel: channel,
        };

        debug!(%address, channel, "opening rfcomm socket");
        // SAFETY: `sockaddr` is a valid `sockaddr_rc` for the length passed and
        // outlives the call; `fd` is an open socket.
        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                (&sockaddr as *const SockaddrRc).cast::<libc::sockaddr>(),
                std::mem::size_of::<SockaddrRc>() as libc::socklen_t,
            )
        };
        let connect_result = if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        };
        abort.clear_hooks();

        if abort.is_aborted() {
            debug!(%address, "rfcomm open aborted");
            return Err(TransportError::Aborted);
        }
        connect_result.map_err(open_err)?;

        info!(%address, channel, "rfcomm connected");
        Ok(Box::new(RfcommStream { fd }))
    }

    fn transport_name(&self) -> &'static str {
        "bluetooth-rfcomm"
    }
}

/// A connected RFCOMM socket.
pub struct RfcommStream {
    fd: OwnedFd,
}

impl Read for RfcommStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for `buf.len()` writable bytes.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

impl Write for RfcommStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for `buf.len()` readable bytes.
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for RfcommStream {
    fn try_clone(&self) -> Result<Box<dyn ByteStream>> {
        let fd = self.fd.try_clone()?;
        Ok(Box::new(RfcommStream { fd }))
    }

    fn shutdown(&self) -> Result<()> {
        // SAFETY: `fd` is an open socket owned by this stream.
        let rc = unsafe { libc::shutdown(self.fd.as_raw_fd(), libc::SHUT_RDWR) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::NotConnected {
            Ok(())
        } else {
            Err(err.into())
        }
    }
}

impl fmt::Debug for RfcommStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RfcommStream")
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}
