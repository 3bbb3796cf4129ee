//! LEGO NXT direct-command encoding for motor control.
//!
//! Every motor update is a fixed 14-byte SETOUTPUTSTATE frame:
//! - A 2-byte little-endian packet length (always 12)
//! - The direct-command type byte and opcode
//! - Port, power, mode, regulation, turn ratio, run state
//! - A 4-byte little-endian tachometer limit
//!
//! Encoding is pure: the same motor states always produce the same bytes.

pub mod codec;
pub mod error;
pub mod motor;

pub use codec::{encode, encode_motor_state, CommandFrame, FRAME_SIZE, HEADER};
pub use error::{CommandError, Result};
pub use motor::{MotorState, MOTOR_A, MOTOR_ALL, MOTOR_B, MOTOR_C};
