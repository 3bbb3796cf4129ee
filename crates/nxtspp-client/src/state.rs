use std::fmt;

use crossbeam_channel::{Receiver, Sender};

/// Public connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session and no connect attempt.
    #[default]
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// A session is live.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Notification emitted by a connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The state changed.
    StateChanged(ConnectionState),
    /// A connect attempt or a live session failed.
    ///
    /// Always followed by `StateChanged(Idle)`.
    ConnectionFailed { reason: String },
}

/// Create an unbounded event channel for a connection manager.
pub fn event_channel() -> (Sender<ConnectionEvent>, Receiver<ConnectionEvent>) {
    crossbeam_channel::unbounded()
}
