use std::sync::Arc;

use nxtspp_command::{encode, MotorState, MOTOR_ALL};
use tracing::debug;

use crate::error::Result;
use crate::manager::ConnectionManager;

/// Destination for encoded command bytes.
pub trait CommandSink {
    /// Send `bytes` as one unit, in call order.
    fn send_command(&self, bytes: &[u8]) -> Result<()>;
}

impl CommandSink for ConnectionManager {
    fn send_command(&self, bytes: &[u8]) -> Result<()> {
        self.write(bytes)
    }
}

impl<S: CommandSink + ?Sized> CommandSink for &S {
    fn send_command(&self, bytes: &[u8]) -> Result<()> {
        (**self).send_command(bytes)
    }
}

impl<S: CommandSink + ?Sized> CommandSink for Arc<S> {
    fn send_command(&self, bytes: &[u8]) -> Result<()> {
        (**self).send_command(bytes)
    }
}

/// Drives NXT motors.
pub trait MotorController {
    /// Apply several motor states with a single write.
    fn set_motor_states(&self, states: &[MotorState]) -> Result<()>;

    /// Apply one motor state.
    fn set_motor_state(&self, state: &MotorState) -> Result<()> {
        self.set_motor_states(std::slice::from_ref(state))
    }
}

/// [`MotorController`] that encodes SETOUTPUTSTATE direct commands into a sink.
#[derive(Debug, Clone)]
pub struct NxtMotorController<S> {
    sink: S,
}

impl<S: CommandSink> NxtMotorController<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Stop every motor, braking or coasting.
    pub fn stop_all(&self, brake: bool) -> Result<()> {
        let state = if brake {
            MotorState::brake(MOTOR_ALL)
        } else {
            MotorState::stop(MOTOR_ALL)
        };
        self.set_motor_state(&state)
    }
}

impl<S: CommandSink> MotorController for NxtMotorController<S> {
    fn set_motor_states(&self, states: &[MotorState]) -> Result<()> {
        let bytes = encode(states)?;
        debug!(frames = states.len(), bytes = bytes.len(), "sending motor command");
        self.sink.send_command(&bytes)
    }
}
