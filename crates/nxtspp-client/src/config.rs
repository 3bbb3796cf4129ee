use std::time::Duration;

/// Default per-read buffer of the reader task.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default cap on buffered inbound bytes: 64 KiB.
pub const DEFAULT_INBOUND_CAPACITY: usize = 64 * 1024;

/// Default cap on queued outbound bytes: 64 KiB.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64 * 1024;

/// Controls buffering and task behaviour of a connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bytes requested from the stream per read.
    pub read_chunk_size: usize,
    /// Inbound bytes buffered before the reader stops draining the stream.
    pub inbound_capacity: usize,
    /// Outbound bytes queued before `write` reports `QueueFull`.
    pub outbound_capacity: usize,
    /// Largest batch the writer hands to the stream in one write.
    pub write_batch_size: usize,
    /// How long cancelling waits for an interrupted connect task to exit.
    pub connect_abort_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            write_batch_size: 256,
            connect_abort_timeout: Duration::from_secs(2),
        }
    }
}
