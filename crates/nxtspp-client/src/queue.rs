use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ClientError, Result};

/// Bytes waiting to be written to the stream, in enqueue order.
///
/// Callers push without blocking; the writer task parks in
/// [`next_batch`](Self::next_batch) while the queue is empty and wakes on push
/// or stop.
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<OutboundState>,
    wake: Condvar,
    drained: Condvar,
    capacity: usize,
}

#[derive(Debug, Default)]
struct OutboundState {
    bytes: VecDeque<u8>,
    /// Bytes handed to the writer and not yet confirmed written.
    in_flight: usize,
    stopped: bool,
}

impl OutboundState {
    fn is_drained(&self) -> bool {
        self.bytes.is_empty() && self.in_flight == 0
    }
}

impl OutboundQueue {
    /// Create an empty queue holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(OutboundState::default()),
            wake: Condvar::new(),
            drained: Condvar::new(),
            capacity,
        }
    }

    /// Number of queued bytes, excluding a batch being written.
    pub fn len(&self) -> usize {
        self.state.lock().bytes.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().bytes.is_empty()
    }

    /// Enqueue `data` as a whole, or nothing if it does not fit.
    pub fn push(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(ClientError::AlreadyClosed);
        }
        if state.bytes.len() + data.len() > self.capacity {
            return Err(ClientError::QueueFull {
                capacity: self.capacity,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        state.bytes.extend(data);
        self.wake.notify_one();
        Ok(())
    }

    /// Take up to `max` of the oldest bytes, parking while the queue is empty.
    ///
    /// Returns `None` once the queue is stopped. The writer must call
    /// [`complete_batch`](Self::complete_batch) after writing the batch.
    pub fn next_batch(&self, max: usize) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return None;
            }
            if !state.bytes.is_empty() {
                let n = max.max(1).min(state.bytes.len());
                let batch: Vec<u8> = state.bytes.drain(..n).collect();
                state.in_flight = batch.len();
                return Some(batch);
            }
            self.wake.wait(&mut state);
        }
    }

    /// Mark the last batch as written.
    pub fn complete_batch(&self) {
        let mut state = self.state.lock();
        state.in_flight = 0;
        if state.is_drained() {
            self.drained.notify_all();
        }
    }

    /// Wait until every queued byte has been written.
    pub fn wait_drained(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.is_drained() {
            if state.stopped {
                return Err(ClientError::AlreadyClosed);
            }
            if self.drained.wait_until(&mut state, deadline).timed_out() && !state.is_drained() {
                return Err(ClientError::Timeout(timeout));
            }
        }
        Ok(())
    }

    /// Stop the queue, waking the writer and any waiter. Queued bytes are dropped.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.bytes.clear();
        self.wake.notify_all();
        self.drained.notify_all();
    }

    /// Whether [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }
}
