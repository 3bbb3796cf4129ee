#![cfg(unix)]

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use nxtspp_client::{
    event_channel, ClientConfig, ClientError, ConnectionEvent, ConnectionManager, ConnectionState,
    MotorController, NxtMotorController,
};
use nxtspp_command::{MotorState, FRAME_SIZE, MOTOR_A};
use nxtspp_transport::{
    AbortSignal, ByteStream, Connector, DeviceAddress, ServiceUuid, TransportError,
};
use parking_lot::{Condvar, Mutex};

type Peer = Arc<Mutex<Option<UnixStream>>>;

/// Opens instantly and keeps the far end of a socket pair for the test.
struct InstantConnector {
    peer: Peer,
}

impl Connector for InstantConnector {
    fn open(
        &self,
        _address: &DeviceAddress,
        _uuid: &ServiceUuid,
        _abort: &AbortSignal,
    ) -> nxtspp_transport::Result<Box<dyn ByteStream>> {
        let (local, remote) = UnixStream::pair()?;
        *self.peer.lock() = Some(remote);
        Ok(Box::new(local))
    }

    fn transport_name(&self) -> &'static str {
        "instant"
    }
}

struct FailingConnector;

impl Connector for FailingConnector {
    fn open(
        &self,
        address: &DeviceAddress,
        _uuid: &ServiceUuid,
        _abort: &AbortSignal,
    ) -> nxtspp_transport::Result<Box<dyn ByteStream>> {
        Err(TransportError::Open {
            address: *address,
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "host is down"),
        })
    }

    fn transport_name(&self) -> &'static str {
        "failing"
    }
}

/// Blocks until aborted.
struct BlockingConnector {
    entered: Sender<()>,
}

impl Connector for BlockingConnector {
    fn open(
        &self,
        _address: &DeviceAddress,
        _uuid: &ServiceUuid,
        abort: &AbortSignal,
    ) -> nxtspp_transport::Result<Box<dyn ByteStream>> {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        abort.on_abort(move || {
            let _ = release_tx.send(());
        });
        let _ = self.entered.send(());
        let _ = release_rx.recv();
        Err(TransportError::Aborted)
    }

    fn transport_name(&self) -> &'static str {
        "blocking"
    }
}

/// Ignores the abort signal and succeeds after a delay.
struct SlowConnector {
    delay: Duration,
    peer: Peer,
}

impl Connector for SlowConnector {
    fn open(
        &self,
        _address: &DeviceAddress,
        _uuid: &ServiceUuid,
        _abort: &AbortSignal,
    ) -> nxtspp_transport::Result<Box<dyn ByteStream>> {
        thread::sleep(self.delay);
        let (local, remote) = UnixStream::pair()?;
        *self.peer.lock() = Some(remote);
        Ok(Box::new(local))
    }

    fn transport_name(&self) -> &'static str {
        "slow"
    }
}

/// A link whose writes always fail with `BrokenPipe`. Reads block until shutdown.
#[derive(Debug, Clone, Default)]
struct BrokenWriteStream {
    shut: Arc<(Mutex<bool>, Condvar)>,
}

impl Read for BrokenWriteStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        let (lock, cvar) = &*self.shut;
        let mut shut = lock.lock();
        while !*shut {
            cvar.wait(&mut shut);
        }
        Ok(0)
    }
}

impl Write for BrokenWriteStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "link dropped"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for BrokenWriteStream {
    fn try_clone(&self) -> nxtspp_transport::Result<Box<dyn ByteStream>> {
        Ok(Box::new(self.clone()))
    }

    fn shutdown(&self) -> nxtspp_transport::Result<()> {
        let (lock, cvar) = &*self.shut;
        *lock.lock() = true;
        cvar.notify_all();
        Ok(())
    }
}

struct BrokenWriteConnector;

impl Connector for BrokenWriteConnector {
    fn open(
        &self,
        _address: &DeviceAddress,
        _uuid: &ServiceUuid,
        _abort: &AbortSignal,
    ) -> nxtspp_transport::Result<Box<dyn ByteStream>> {
        Ok(Box::new(BrokenWriteStream::default()))
    }

    fn transport_name(&self) -> &'static str {
        "broken-write"
    }
}

fn nxt_address() -> DeviceAddress {
    "00:16:53:0A:0B:0C"
        .parse()
        .expect("address literal should parse")
}

fn recv_event(rx: &Receiver<ConnectionEvent>) -> ConnectionEvent {
    rx.recv_timeout(Duration::from_secs(3))
        .expect("event should arrive")
}

fn expect_state(rx: &Receiver<ConnectionEvent>, state: ConnectionState) {
    assert_eq!(recv_event(rx), ConnectionEvent::StateChanged(state));
}

fn take_peer(peer: &Peer) -> UnixStream {
    peer.lock().take().expect("connector should have opened a pair")
}

fn wait_available(manager: &ConnectionManager, n: usize) {
    let start = Instant::now();
    while manager.available().expect("manager should be connected") < n {
        if start.elapsed() >= Duration::from_secs(3) {
            panic!("timed out waiting for {n} buffered bytes");
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn connected_manager() -> (ConnectionManager, Receiver<ConnectionEvent>, UnixStream) {
    let peer = Peer::default();
    let (tx, rx) = event_channel();
    let manager = ConnectionManager::new(
        InstantConnector {
            peer: Arc::clone(&peer),
        },
        tx,
    );
    manager
        .connect_serial_port(nxt_address())
        .expect("connect should start");
    expect_state(&rx, ConnectionState::Connecting);
    expect_state(&rx, ConnectionState::Connected);
    (manager, rx, take_peer(&peer))
}

#[test]
fn instant_open_goes_connecting_then_connected() {
    let (manager, rx, _peer) = connected_manager();
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert!(rx.try_recv().is_err());
}

#[test]
fn failed_open_reports_once_and_returns_to_idle() {
    let (tx, rx) = event_channel();
    let manager = ConnectionManager::new(FailingConnector, tx);
    manager
        .connect(nxt_address(), ServiceUuid::SERIAL_PORT)
        .expect("connect should start");

    expect_state(&rx, ConnectionState::Connecting);
    match recv_event(&rx) {
        ConnectionEvent::ConnectionFailed { reason } => assert!(reason.contains("host is down")),
        other => panic!("expected ConnectionFailed, got {other:?}"),
    }
    expect_state(&rx, ConnectionState::Idle);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn reads_return_oldest_bytes_first() {
    let (manager, _rx, mut peer) = connected_manager();
    peer.write_all(&[1, 2, 3]).expect("peer write");
    peer.write_all(&[4, 5]).expect("peer write");
    wait_available(&manager, 5);

    assert_eq!(manager.read(2).expect("read"), vec![1, 2]);
    assert_eq!(manager.read_byte().expect("read byte"), 3);
    assert_eq!(manager.read(2).expect("read"), vec![4, 5]);
}

#[test]
fn short_read_consumes_nothing() {
    let (manager, _rx, mut peer) = connected_manager();
    peer.write_all(&[7, 8, 9]).expect("peer write");
    wait_available(&manager, 3);

    let err = manager.read(4).expect_err("read should fail");
    assert!(matches!(
        err,
        ClientError::InsufficientData {
            requested: 4,
            available: 3
        }
    ));
    assert_eq!(manager.available().expect("available"), 3);

    manager.clear_read_buffer().expect("clear");
    assert_eq!(manager.available().expect("available"), 0);
}

#[test]
fn writes_reach_peer_in_order() {
    let (manager, _rx, mut peer) = connected_manager();
    manager.write(&[0x10, 0x11]).expect("write");
    manager.write(&[0x12]).expect("write");
    manager.flush(Duration::from_secs(2)).expect("flush");

    let mut buf = [0u8; 3];
    peer.read_exact(&mut buf).expect("peer read");
    assert_eq!(buf, [0x10, 0x11, 0x12]);
}

#[test]
fn oversized_write_is_rejected_whole() {
    let peer = Peer::default();
    let (tx, rx) = event_channel();
    let config = ClientConfig {
        outbound_capacity: 8,
        ..ClientConfig::default()
    };
    let manager = ConnectionManager::with_config(
        InstantConnector {
            peer: Arc::clone(&peer),
        },
        tx,
        config,
    );
    manager
        .connect_serial_port(nxt_address())
        .expect("connect should start");
    expect_state(&rx, ConnectionState::Connecting);
    expect_state(&rx, ConnectionState::Connected);

    let err = manager.write(&[0u8; 9]).expect_err("write should fail");
    assert!(matches!(err, ClientError::QueueFull { capacity: 8 }));
}

#[test]
fn motor_command_is_written_as_one_frame() {
    let (manager, _rx, mut peer) = connected_manager();
    let controller = NxtMotorController::new(&manager);
    controller
        .set_motor_state(&MotorState::new(MOTOR_A, 50).with_speed_regulation())
        .expect("set motor state");
    manager.flush(Duration::from_secs(2)).expect("flush");

    let mut frame = [0u8; FRAME_SIZE];
    peer.read_exact(&mut frame).expect("peer read");
    assert_eq!(&frame[..4], &[0x0C, 0x00, 0x80, 0x04]);
    assert_eq!(frame[4], MOTOR_A);
    assert_eq!(frame[5], 50);
    assert_eq!(frame[6], 0x01 | 0x04);
    assert_eq!(frame[7], 0x01);
}

#[test]
fn peer_disconnect_reports_failure_then_idle() {
    let (manager, rx, peer) = connected_manager();
    drop(peer);

    assert!(matches!(
        recv_event(&rx),
        ConnectionEvent::ConnectionFailed { .. }
    ));
    expect_state(&rx, ConnectionState::Idle);
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(matches!(manager.write(&[1]), Err(ClientError::NotConnected)));
}

#[test]
fn writer_failure_reports_failure_then_idle() {
    let (tx, rx) = event_channel();
    let manager = ConnectionManager::new(BrokenWriteConnector, tx);
    manager
        .connect_serial_port(nxt_address())
        .expect("connect should start");
    expect_state(&rx, ConnectionState::Connecting);
    expect_state(&rx, ConnectionState::Connected);

    manager.write(&[1]).expect("write should be queued");

    match recv_event(&rx) {
        ConnectionEvent::ConnectionFailed { reason } => {
            assert!(reason.contains("write failed"), "unexpected reason: {reason}")
        }
        other => panic!("expected ConnectionFailed, got {other:?}"),
    }
    expect_state(&rx, ConnectionState::Idle);
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn close_is_idempotent() {
    let (manager, rx, _peer) = connected_manager();
    manager.close();
    manager.close();

    expect_state(&rx, ConnectionState::Idle);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn concurrent_close_emits_single_idle() {
    let (manager, rx, mut peer) = connected_manager();
    let manager = Arc::new(manager);

    let closers: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.close())
        })
        .collect();
    for closer in closers {
        closer.join().expect("close thread panicked");
    }

    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![ConnectionEvent::StateChanged(ConnectionState::Idle)]
    );
    assert_eq!(manager.state(), ConnectionState::Idle);

    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).expect("peer read"), 0);
}

#[test]
fn close_shuts_the_stream() {
    let (manager, _rx, mut peer) = connected_manager();
    manager.close();

    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).expect("peer read"), 0);
}

#[test]
fn cancel_interrupts_blocked_open() {
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let (tx, rx) = event_channel();
    let manager = ConnectionManager::new(
        BlockingConnector {
            entered: entered_tx,
        },
        tx,
    );
    manager
        .connect_serial_port(nxt_address())
        .expect("connect should start");
    expect_state(&rx, ConnectionState::Connecting);
    entered_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("open should start");

    assert!(manager.cancel_connection());
    expect_state(&rx, ConnectionState::Idle);
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn stream_opened_after_cancel_is_discarded() {
    let peer = Peer::default();
    let (tx, rx) = event_channel();
    let config = ClientConfig {
        connect_abort_timeout: Duration::from_millis(20),
        ..ClientConfig::default()
    };
    let manager = ConnectionManager::with_config(
        SlowConnector {
            delay: Duration::from_millis(200),
            peer: Arc::clone(&peer),
        },
        tx,
        config,
    );
    manager
        .connect_serial_port(nxt_address())
        .expect("connect should start");
    expect_state(&rx, ConnectionState::Connecting);

    assert!(manager.cancel_connection());
    expect_state(&rx, ConnectionState::Idle);

    thread::sleep(Duration::from_millis(400));
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(rx.try_recv().is_err());

    let mut late_peer = take_peer(&peer);
    let mut buf = [0u8; 1];
    assert_eq!(late_peer.read(&mut buf).expect("peer read"), 0);
}

#[test]
fn reconnect_tears_down_previous_session_first() {
    let peer = Peer::default();
    let (tx, rx) = event_channel();
    let manager = ConnectionManager::new(
        InstantConnector {
            peer: Arc::clone(&peer),
        },
        tx,
    );
    manager
        .connect_serial_port(nxt_address())
        .expect("connect should start");
    expect_state(&rx, ConnectionState::Connecting);
    expect_state(&rx, ConnectionState::Connected);
    let mut first_peer = take_peer(&peer);

    manager
        .connect_serial_port(nxt_address())
        .expect("reconnect should start");
    expect_state(&rx, ConnectionState::Idle);
    expect_state(&rx, ConnectionState::Connecting);
    expect_state(&rx, ConnectionState::Connected);

    let mut buf = [0u8; 1];
    assert_eq!(first_peer.read(&mut buf).expect("peer read"), 0);
}

#[test]
fn dropping_manager_closes_connection() {
    let (manager, rx, mut peer) = connected_manager();
    drop(manager);

    expect_state(&rx, ConnectionState::Idle);
    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).expect("peer read"), 0);
}
