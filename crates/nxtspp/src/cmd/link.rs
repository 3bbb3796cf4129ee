use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use nxtspp_client::{
    event_channel, ClientConfig, ConnectionEvent, ConnectionManager, ConnectionState,
};
use nxtspp_transport::Connector;
use tracing::{debug, info};

use crate::cmd::{parse_duration, ConnectArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, TIMEOUT, TRANSPORT_ERROR};

/// A connected manager plus its event stream.
pub struct Link {
    manager: ConnectionManager,
    events: Receiver<ConnectionEvent>,
}

impl Link {
    /// Connect and wait until the session is live.
    pub fn open(args: &ConnectArgs) -> CliResult<Self> {
        let timeout = parse_duration(&args.timeout)?;
        let (events_tx, events) = event_channel();
        let manager = ConnectionManager::from_shared_connector(
            platform_connector(args)?,
            events_tx,
            ClientConfig::default(),
        );

        manager
            .connect(args.address, args.service)
            .map_err(|err| client_error("connect failed", err))?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match events.recv_timeout(remaining) {
                Ok(ConnectionEvent::StateChanged(ConnectionState::Connected)) => break,
                Ok(ConnectionEvent::ConnectionFailed { reason }) => {
                    return Err(CliError::new(
                        TRANSPORT_ERROR,
                        format!("connect failed: {reason}"),
                    ));
                }
                Ok(event) => debug!(?event, "connection event"),
                Err(RecvTimeoutError::Timeout) => {
                    manager.cancel_connection();
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect to {} timed out after {timeout:?}", args.address),
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CliError::new(
                        INTERNAL,
                        "connection event channel closed",
                    ));
                }
            }
        }

        info!(address = %args.address, "connected");
        Ok(Self { manager, events })
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Failure reason reported since the last check, if any.
    pub fn failure(&self) -> Option<String> {
        self.events.try_iter().find_map(|event| match event {
            ConnectionEvent::ConnectionFailed { reason } => Some(reason),
            _ => None,
        })
    }

    pub fn close(self) {
        self.manager.close();
    }
}

#[cfg(target_os = "linux")]
fn platform_connector(args: &ConnectArgs) -> CliResult<Arc<dyn Connector>> {
    let connector =
        nxtspp_transport::RfcommConnector::new().with_service_channel(args.service, args.channel);
    Ok(Arc::new(connector))
}

#[cfg(not(target_os = "linux"))]
fn platform_connector(_args: &ConnectArgs) -> CliResult<Arc<dyn Connector>> {
    Err(CliError::new(
        TRANSPORT_ERROR,
        "RFCOMM connections are only supported on Linux",
    ))
}
