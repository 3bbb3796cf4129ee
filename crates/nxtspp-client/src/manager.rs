use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use nxtspp_transport::{AbortSignal, ByteStream, Connector, DeviceAddress, ServiceUuid};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::buffer::InboundBuffer;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::queue::OutboundQueue;
use crate::session::{FailureHandler, Session, StreamFailure};
use crate::state::{ConnectionEvent, ConnectionState};

/// Owns at most one connection to a device and the tasks serving it.
///
/// `connect` returns immediately; progress is reported through the event
/// channel passed at construction. Events for one manager are delivered in
/// the order the state changes happen.
///
/// All methods take `&self` and may be called from any thread.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

struct Shared {
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    events: Sender<ConnectionEvent>,
    /// Serialises connect, close and cancel against each other.
    lifecycle: Mutex<()>,
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    attempt: Option<ConnectAttempt>,
    session: Option<Session>,
    /// Stream failure of a session that started but is not installed yet.
    pending_failure: Option<(u64, String)>,
}

struct ConnectAttempt {
    id: u64,
    abort: AbortSignal,
    /// Disconnects when the connect task exits.
    done: Receiver<()>,
}

impl ConnectionManager {
    /// Create an idle manager using the default configuration.
    pub fn new(connector: impl Connector + 'static, events: Sender<ConnectionEvent>) -> Self {
        Self::with_config(connector, events, ClientConfig::default())
    }

    /// Create an idle manager with explicit configuration.
    pub fn with_config(
        connector: impl Connector + 'static,
        events: Sender<ConnectionEvent>,
        config: ClientConfig,
    ) -> Self {
        Self::from_shared_connector(Arc::new(connector), events, config)
    }

    /// Create an idle manager around an already shared connector.
    pub fn from_shared_connector(
        connector: Arc<dyn Connector>,
        events: Sender<ConnectionEvent>,
        config: ClientConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                events,
                lifecycle: Mutex::new(()),
                inner: Mutex::new(Inner::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Start connecting to `address`, resolving `uuid` to a service.
    ///
    /// Any existing session or attempt is torn down first (reported as
    /// `StateChanged(Idle)`). Emits `StateChanged(Connecting)` before
    /// returning, then either `StateChanged(Connected)` or
    /// `ConnectionFailed` followed by `StateChanged(Idle)`.
    pub fn connect(&self, address: DeviceAddress, uuid: ServiceUuid) -> Result<()> {
        let shared = &self.shared;
        let _lifecycle = shared.lifecycle.lock();

        let (previous_attempt, previous_session) = shared.take_current();
        shared.finish_attempt(previous_attempt);
        drop(previous_session);

        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let abort = AbortSignal::new();
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);

        let mut inner = shared.inner.lock();
        shared.set_state(&mut inner, ConnectionState::Connecting);
        info!(attempt = id, %address, service = %uuid, transport = shared.connector.transport_name(), "connecting");

        let spawned = {
            let weak = Arc::downgrade(shared);
            let connector = Arc::clone(&shared.connector);
            let abort = abort.clone();
            thread::Builder::new()
                .name(format!("nxtspp-connect-{id}"))
                .spawn(move || {
                    let _done = done_tx;
                    let result = connector.open(&address, &uuid, &abort);
                    match weak.upgrade() {
                        Some(shared) => shared.complete_connect(id, result),
                        None => discard_stream(id, result),
                    }
                })
        };

        match spawned {
            Ok(_) => {
                inner.attempt = Some(ConnectAttempt { id, abort, done });
                Ok(())
            }
            Err(source) => {
                shared.fail(&mut inner, format!("failed to spawn connect task: {source}"));
                Err(ClientError::Spawn {
                    task: "connect",
                    source,
                })
            }
        }
    }

    /// Connect to the standard serial port profile service on `address`.
    pub fn connect_serial_port(&self, address: DeviceAddress) -> Result<()> {
        self.connect(address, ServiceUuid::SERIAL_PORT)
    }

    /// Tear down the session or attempt, if any, and return to `Idle`.
    ///
    /// Idempotent: closing an idle manager emits nothing. Queued outbound
    /// bytes and buffered inbound bytes are discarded.
    pub fn close(&self) {
        let shared = &self.shared;
        let _lifecycle = shared.lifecycle.lock();

        let (attempt, session) = shared.take_current();
        shared.finish_attempt(attempt);
        if let Some(session) = session {
            info!(session = session.id(), "closing connection");
            drop(session);
        }
    }

    /// Abort an in-flight connect attempt.
    ///
    /// Returns `false` (and does nothing) unless the manager is `Connecting`.
    /// A stream that opens after the cancel is discarded.
    pub fn cancel_connection(&self) -> bool {
        let shared = &self.shared;
        let _lifecycle = shared.lifecycle.lock();

        let attempt = {
            let mut inner = shared.inner.lock();
            if inner.state != ConnectionState::Connecting {
                return false;
            }
            let attempt = inner.attempt.take();
            inner.pending_failure = None;
            shared.set_state(&mut inner, ConnectionState::Idle);
            attempt
        };
        info!("connect attempt cancelled");
        shared.finish_attempt(attempt);
        true
    }

    /// Queue `bytes` for sending, in call order. Does not block.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let outbound = self.shared.outbound()?;
        outbound.push(bytes).map_err(closed_as_not_connected)
    }

    /// Remove and return exactly `n` buffered bytes.
    ///
    /// Fails with `InsufficientData` without consuming anything when fewer
    /// are buffered.
    pub fn read(&self, n: usize) -> Result<Vec<u8>> {
        self.shared.inbound()?.pop(n)
    }

    /// Remove and return the oldest buffered byte.
    pub fn read_byte(&self) -> Result<u8> {
        let bytes = self.read(1)?;
        Ok(bytes[0])
    }

    /// Number of buffered inbound bytes.
    pub fn available(&self) -> Result<usize> {
        Ok(self.shared.inbound()?.size())
    }

    /// Discard all buffered inbound bytes.
    pub fn clear_read_buffer(&self) -> Result<()> {
        self.shared.inbound()?.clear();
        Ok(())
    }

    /// Wait until every queued byte has been handed to the stream.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let outbound = self.shared.outbound()?;
        outbound.wait_drained(timeout).map_err(closed_as_not_connected)
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.shared.connector.transport_name())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl Shared {
    /// Detach the current attempt and session, moving to `Idle` if either existed.
    fn take_current(&self) -> (Option<ConnectAttempt>, Option<Session>) {
        let mut inner = self.inner.lock();
        let attempt = inner.attempt.take();
        let session = inner.session.take();
        inner.pending_failure = None;
        if attempt.is_some() || session.is_some() {
            self.set_state(&mut inner, ConnectionState::Idle);
        }
        (attempt, session)
    }

    /// Abort a detached attempt and wait (bounded) for its task to exit.
    fn finish_attempt(&self, attempt: Option<ConnectAttempt>) {
        let Some(attempt) = attempt else {
            return;
        };
        debug!(attempt = attempt.id, "aborting connect attempt");
        attempt.abort.abort();
        let timeout = self.config.connect_abort_timeout;
        if let Err(RecvTimeoutError::Timeout) = attempt.done.recv_timeout(timeout) {
            warn!(
                attempt = attempt.id,
                ?timeout,
                "connect task still running after abort, detaching"
            );
        }
    }

    fn complete_connect(
        self: &Arc<Self>,
        id: u64,
        result: nxtspp_transport::Result<Box<dyn ByteStream>>,
    ) {
        let started = match result {
            Ok(stream) if self.is_current_attempt(id) => {
                Session::start(id, stream, &self.config, self.failure_handler())
            }
            Ok(stream) => {
                discard_stream(id, Ok(stream));
                return;
            }
            Err(err) => Err(ClientError::Stream(err)),
        };

        let mut inner = self.inner.lock();
        if !inner.attempt.as_ref().is_some_and(|attempt| attempt.id == id) {
            drop(inner);
            debug!(attempt = id, "connect attempt superseded, discarding result");
            drop(started);
            return;
        }
        inner.attempt = None;
        let early_failure = match inner.pending_failure.take() {
            Some((failed, reason)) if failed == id => Some(reason),
            _ => None,
        };

        match (started, early_failure) {
            (Ok(session), None) => {
                inner.session = Some(session);
                info!(session = id, "connected");
                self.set_state(&mut inner, ConnectionState::Connected);
            }
            (Ok(session), Some(reason)) => {
                warn!(session = id, %reason, "stream failed during connect");
                self.fail(&mut inner, reason);
                drop(inner);
                drop(session);
            }
            (Err(err), _) => {
                warn!(attempt = id, error = %err, "connect failed");
                self.fail(&mut inner, err.to_string());
            }
        }
    }

    fn failure_handler(self: &Arc<Self>) -> FailureHandler {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |id, failure| {
            if let Some(shared) = weak.upgrade() {
                shared.session_failed(id, failure);
            }
        })
    }

    fn session_failed(&self, id: u64, failure: StreamFailure) {
        let mut inner = self.inner.lock();
        if inner.session.as_ref().is_some_and(|session| session.id() == id) {
            let session = inner.session.take();
            warn!(session = id, %failure, "connection lost");
            self.fail(&mut inner, failure.to_string());
            drop(inner);
            drop(session);
        } else if inner.attempt.as_ref().is_some_and(|attempt| attempt.id == id) {
            inner.pending_failure = Some((id, failure.to_string()));
        } else {
            debug!(session = id, %failure, "ignoring failure of a closed session");
        }
    }

    fn is_current_attempt(&self, id: u64) -> bool {
        self.inner
            .lock()
            .attempt
            .as_ref()
            .is_some_and(|attempt| attempt.id == id)
    }

    fn inbound(&self) -> Result<Arc<InboundBuffer>> {
        let inner = self.inner.lock();
        match (&inner.state, &inner.session) {
            (ConnectionState::Connected, Some(session)) => Ok(Arc::clone(session.inbound())),
            _ => Err(ClientError::NotConnected),
        }
    }

    fn outbound(&self) -> Result<Arc<OutboundQueue>> {
        let inner = self.inner.lock();
        match (&inner.state, &inner.session) {
            (ConnectionState::Connected, Some(session)) => Ok(Arc::clone(session.outbound())),
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Report a failure and return to `Idle`, in that order.
    fn fail(&self, inner: &mut Inner, reason: String) {
        self.emit(ConnectionEvent::ConnectionFailed { reason });
        self.set_state(inner, ConnectionState::Idle);
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        if inner.state == state {
            return;
        }
        debug!(from = %inner.state, to = %state, "state changed");
        inner.state = state;
        self.emit(ConnectionEvent::StateChanged(state));
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

fn closed_as_not_connected(err: ClientError) -> ClientError {
    match err {
        ClientError::AlreadyClosed => ClientError::NotConnected,
        other => other,
    }
}

fn discard_stream(id: u64, result: nxtspp_transport::Result<Box<dyn ByteStream>>) {
    if let Ok(stream) = result {
        debug!(attempt = id, "discarding stream of a cancelled attempt");
        if let Err(err) = stream.shutdown() {
            debug!(attempt = id, error = %err, "discarded stream shutdown failed");
        }
    }
}
