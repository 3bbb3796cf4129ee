//! Connection management and motor control for LEGO NXT bricks over
//! Bluetooth serial.
//!
//! A [`ConnectionManager`] owns at most one link at a time. Connecting runs on
//! a background task and reports progress as [`ConnectionEvent`]s; once
//! connected, a reader task fills the inbound buffer and a writer task drains
//! the outbound queue, so [`write`](ConnectionManager::write) and
//! [`read`](ConnectionManager::read) never touch the stream directly.

pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod manager;
pub mod queue;
mod session;
pub mod state;

pub use buffer::InboundBuffer;
pub use config::{
    ClientConfig, DEFAULT_INBOUND_CAPACITY, DEFAULT_OUTBOUND_CAPACITY, DEFAULT_READ_CHUNK_SIZE,
};
pub use controller::{CommandSink, MotorController, NxtMotorController};
pub use error::{ClientError, Result};
pub use manager::ConnectionManager;
pub use queue::OutboundQueue;
pub use state::{event_channel, ConnectionEvent, ConnectionState};
