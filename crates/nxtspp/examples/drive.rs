//! Drive forward on ports B and C for two seconds, then brake.
//!
//! Usage: cargo run --example drive -- 00:16:53:AA:BB:CC

#[cfg(target_os = "linux")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::time::Duration;

    use nxtspp::client::{
        event_channel, ConnectionEvent, ConnectionManager, ConnectionState, MotorController,
        NxtMotorController,
    };
    use nxtspp::command::{MotorState, MOTOR_B, MOTOR_C};
    use nxtspp::transport::{DeviceAddress, RfcommConnector};

    let address: DeviceAddress = std::env::args()
        .nth(1)
        .ok_or("usage: drive <ADDRESS>")?
        .parse()?;

    let (events_tx, events) = event_channel();
    let manager = ConnectionManager::new(RfcommConnector::new(), events_tx);
    manager.connect_serial_port(address)?;

    loop {
        match events.recv_timeout(Duration::from_secs(15))? {
            ConnectionEvent::StateChanged(ConnectionState::Connected) => break,
            ConnectionEvent::ConnectionFailed { reason } => return Err(reason.into()),
            _ => {}
        }
    }
    println!("connected to {address}");

    let controller = NxtMotorController::new(&manager);
    controller.set_motor_states(&[
        MotorState::new(MOTOR_B, 75).with_sync(&[MOTOR_C], 0),
        MotorState::new(MOTOR_C, 75).with_sync(&[MOTOR_B], 0),
    ])?;
    std::thread::sleep(Duration::from_secs(2));

    controller.stop_all(true)?;
    manager.flush(Duration::from_secs(2))?;
    manager.close();
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("this example needs the Linux RFCOMM connector");
}
