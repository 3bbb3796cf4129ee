use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nxtspp_transport::ByteStream;
use tracing::{debug, trace, warn};

use crate::buffer::InboundBuffer;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::queue::OutboundQueue;

/// Why a session's stream stopped working.
#[derive(Debug)]
pub(crate) enum StreamFailure {
    /// The peer closed the link.
    Eof,
    Read(io::Error),
    Write(io::Error),
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("connection closed by peer"),
            Self::Read(err) => write!(f, "read failed: {err}"),
            Self::Write(err) => write!(f, "write failed: {err}"),
        }
    }
}

/// Called from a session task when the stream fails while the session is open.
pub(crate) type FailureHandler = Arc<dyn Fn(u64, StreamFailure) + Send + Sync>;

/// A live stream plus its reader and writer tasks.
///
/// Dropping the session stops both tasks, shuts the stream down once and
/// joins the tasks (except one that is itself running the drop).
pub(crate) struct Session {
    id: u64,
    stream: Box<dyn ByteStream>,
    inbound: Arc<InboundBuffer>,
    outbound: Arc<OutboundQueue>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Session {
    /// Take ownership of `stream` and start its reader and writer tasks.
    pub(crate) fn start(
        id: u64,
        stream: Box<dyn ByteStream>,
        config: &ClientConfig,
        on_failure: FailureHandler,
    ) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let writer_stream = stream.try_clone()?;

        let mut session = Self {
            id,
            stream,
            inbound: Arc::new(InboundBuffer::new(config.inbound_capacity)),
            outbound: Arc::new(OutboundQueue::new(config.outbound_capacity)),
            reader: None,
            writer: None,
        };

        let reader = {
            let inbound = Arc::clone(&session.inbound);
            let on_failure = Arc::clone(&on_failure);
            let chunk_size = config.read_chunk_size;
            thread::Builder::new()
                .name(format!("nxtspp-reader-{id}"))
                .spawn(move || run_reader(id, reader_stream, &inbound, chunk_size, &on_failure))
                .map_err(|source| ClientError::Spawn {
                    task: "reader",
                    source,
                })?
        };
        session.reader = Some(reader);

        let writer = {
            let outbound = Arc::clone(&session.outbound);
            let batch_size = config.write_batch_size;
            thread::Builder::new()
                .name(format!("nxtspp-writer-{id}"))
                .spawn(move || run_writer(id, writer_stream, &outbound, batch_size, &on_failure))
                .map_err(|source| ClientError::Spawn {
                    task: "writer",
                    source,
                })?
        };
        session.writer = Some(writer);

        debug!(session = id, "session started");
        Ok(session)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn inbound(&self) -> &Arc<InboundBuffer> {
        &self.inbound
    }

    pub(crate) fn outbound(&self) -> &Arc<OutboundQueue> {
        &self.outbound
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("stream", &self.stream)
            .field("buffered", &self.inbound.size())
            .field("queued", &self.outbound.len())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Mark both sides closed before the shutdown so the tasks exit quietly.
        self.outbound.stop();
        self.inbound.close();
        if let Err(err) = self.stream.shutdown() {
            warn!(session = self.id, error = %err, "stream shutdown failed");
        }
        join_task(self.id, "reader", self.reader.take());
        join_task(self.id, "writer", self.writer.take());
        debug!(session = self.id, "session closed");
    }
}

fn join_task(id: u64, task: &str, handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        warn!(session = id, task, "session task panicked");
    }
}

fn run_reader(
    id: u64,
    mut stream: Box<dyn ByteStream>,
    inbound: &InboundBuffer,
    chunk_size: usize,
    on_failure: &FailureHandler,
) {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let failure = loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break StreamFailure::Eof,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => break StreamFailure::Read(err),
        };
        trace!(session = id, bytes = n, "received");
        if !inbound.push(&buf[..n]) {
            debug!(session = id, "reader stopped");
            return;
        }
    };

    if inbound.is_closed() {
        debug!(session = id, "reader stopped");
        return;
    }
    on_failure(id, failure);
}

fn run_writer(
    id: u64,
    mut stream: Box<dyn ByteStream>,
    outbound: &OutboundQueue,
    batch_size: usize,
    on_failure: &FailureHandler,
) {
    while let Some(batch) = outbound.next_batch(batch_size) {
        let result = write_batch(stream.as_mut(), &batch);
        outbound.complete_batch();
        if let Err(err) = result {
            if !outbound.is_stopped() {
                on_failure(id, StreamFailure::Write(err));
            }
            return;
        }
        trace!(session = id, bytes = batch.len(), "sent");
    }
    debug!(session = id, "writer stopped");
}

fn write_batch(stream: &mut dyn ByteStream, batch: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < batch.len() {
        match stream.write(&batch[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "stream accepted no bytes",
                ));
            }
            Ok(n) => written += n,
            Err(err)
                if err.kind() == io::ErrorKind::Interrupted
                    || err.kind() == io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    loop {
        match stream.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
