use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::{ClientError, Result};

/// Bytes received from the stream and not yet read by the caller.
///
/// The reader task pushes, callers pop. When `capacity` bytes are buffered the
/// reader blocks in [`push`](Self::push) until a pop makes room or the buffer
/// is closed, which stops draining the stream.
#[derive(Debug)]
pub struct InboundBuffer {
    state: Mutex<InboundState>,
    space: Condvar,
    capacity: usize,
}

#[derive(Debug, Default)]
struct InboundState {
    bytes: VecDeque<u8>,
    closed: bool,
}

impl InboundBuffer {
    /// Create an empty buffer holding at most `capacity` bytes (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(InboundState::default()),
            space: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of buffered bytes.
    pub fn size(&self) -> usize {
        self.state.lock().bytes.len()
    }

    /// Remove and return the `n` oldest bytes.
    ///
    /// Fails without consuming anything if fewer than `n` are buffered.
    pub fn pop(&self, n: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        let available = state.bytes.len();
        if n > available {
            return Err(ClientError::InsufficientData {
                requested: n,
                available,
            });
        }
        let bytes: Vec<u8> = state.bytes.drain(..n).collect();
        self.space.notify_all();
        Ok(bytes)
    }

    /// Discard everything buffered.
    pub fn clear(&self) {
        self.state.lock().bytes.clear();
        self.space.notify_all();
    }

    /// Append `data` in order, blocking while the buffer is full.
    ///
    /// Returns `false` once the buffer is closed; bytes not yet appended at
    /// that point are dropped.
    pub fn push(&self, mut data: &[u8]) -> bool {
        let mut state = self.state.lock();
        while !data.is_empty() {
            if state.closed {
                return false;
            }
            let room = self.capacity.saturating_sub(state.bytes.len());
            if room == 0 {
                self.space.wait(&mut state);
                continue;
            }
            let take = room.min(data.len());
            state.bytes.extend(&data[..take]);
            data = &data[take..];
        }
        !state.closed
    }

    /// Close the buffer, waking a blocked producer. Buffered bytes stay readable.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.space.notify_all();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
