use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CommandError, Result};
use crate::motor::{is_valid_motor, is_valid_power, MotorState};

/// Size of one encoded motor command, including the length prefix.
pub const FRAME_SIZE: usize = 14;

/// Length prefix value: the frame size minus the 2-byte prefix itself.
pub const PACKET_LENGTH: u16 = (FRAME_SIZE - 2) as u16;

/// Command type: direct command, no reply requested.
pub const DIRECT_COMMAND_NO_REPLY: u8 = 0x80;

/// Opcode: SETOUTPUTSTATE.
pub const SET_OUTPUT_STATE: u8 = 0x04;

/// Fixed frame header: length (LE), command type, opcode.
pub const HEADER: [u8; 4] = [
    PACKET_LENGTH as u8,
    (PACKET_LENGTH >> 8) as u8,
    DIRECT_COMMAND_NO_REPLY,
    SET_OUTPUT_STATE,
];

/// Output mode bits.
pub mod mode {
    pub const MOTORON: u8 = 0x01;
    pub const BRAKE: u8 = 0x02;
    pub const REGULATED: u8 = 0x04;
}

/// Regulation mode bits.
pub mod regulation {
    pub const IDLE: u8 = 0x00;
    pub const MOTOR_SPEED: u8 = 0x01;
    pub const MOTOR_SYNC: u8 = 0x02;
}

/// Run state values.
pub mod run_state {
    pub const IDLE: u8 = 0x00;
    pub const RAMPUP: u8 = 0x10;
    pub const RUNNING: u8 = 0x20;
    pub const RAMPDOWN: u8 = 0x40;
}

const MOTOR_OFFSET: usize = 4;
const POWER_OFFSET: usize = 5;
const MODE_OFFSET: usize = 6;
const REGULATION_OFFSET: usize = 7;
const TURN_RATIO_OFFSET: usize = 8;
const RUN_STATE_OFFSET: usize = 9;
const TACHO_OFFSET: usize = 10;

/// One encoded SETOUTPUTSTATE frame.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────┬────────┬──────┬───────┬──────┬─────┬──────┬───────┬──────────────┐
/// │ Length    │ Type │ Opcode │ Port │ Power │ Mode │ Reg │ Turn │ RunSt │ Tacho limit  │
/// │ (2B LE)   │ 0x80 │ 0x04   │ (1B) │ (i8)  │ (1B) │(1B) │ (i8) │ (1B)  │ (4B LE)      │
/// │ 0x0C 0x00 │      │        │      │       │      │     │      │       │              │
/// └───────────┴──────┴────────┴──────┴───────┴──────┴─────┴──────┴───────┴──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; FRAME_SIZE]);

impl CommandFrame {
    /// Validate `state` and build its frame.
    pub fn from_state(state: &MotorState) -> Result<Self> {
        validate(state)?;

        let mut motor_mode = 0u8;
        let mut regulation_mode = regulation::IDLE;
        let mut motor_run_state = run_state::IDLE;

        if state.power != 0 {
            motor_mode |= mode::MOTORON;
            motor_run_state |= run_state::RUNNING;
            if state.sync || state.speed_regulation {
                motor_mode |= mode::REGULATED;
                if state.speed_regulation {
                    regulation_mode |= regulation::MOTOR_SPEED;
                }
                if state.sync {
                    regulation_mode |= regulation::MOTOR_SYNC;
                }
            }
        }
        if state.brake {
            motor_mode |= mode::BRAKE | mode::MOTORON;
            motor_run_state |= run_state::RUNNING;
        }

        let turn_ratio = if state.sync {
            state.synced_turn_ratio
        } else {
            0
        };

        let mut bytes = [0u8; FRAME_SIZE];
        bytes[..HEADER.len()].copy_from_slice(&HEADER);
        bytes[MOTOR_OFFSET] = state.motor;
        bytes[POWER_OFFSET] = state.power as u8;
        bytes[MODE_OFFSET] = motor_mode;
        bytes[REGULATION_OFFSET] = regulation_mode;
        bytes[TURN_RATIO_OFFSET] = turn_ratio as u8;
        bytes[RUN_STATE_OFFSET] = motor_run_state;
        for i in 0..4 {
            bytes[TACHO_OFFSET + i] = (state.tachometer_limit >> (8 * i)) as u8;
        }
        Ok(Self(bytes))
    }

    /// Interpret `bytes` as a frame, checking size and header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; FRAME_SIZE] = bytes
            .try_into()
            .map_err(|_| CommandError::InvalidFrame("frame must be exactly 14 bytes"))?;
        if bytes[..HEADER.len()] != HEADER {
            return Err(CommandError::InvalidFrame("not a SETOUTPUTSTATE direct command"));
        }
        Ok(Self(bytes))
    }

    /// The raw frame bytes.
    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    pub fn motor(&self) -> u8 {
        self.0[MOTOR_OFFSET]
    }

    pub fn power(&self) -> i8 {
        self.0[POWER_OFFSET] as i8
    }

    pub fn mode(&self) -> u8 {
        self.0[MODE_OFFSET]
    }

    pub fn regulation_mode(&self) -> u8 {
        self.0[REGULATION_OFFSET]
    }

    pub fn turn_ratio(&self) -> i8 {
        self.0[TURN_RATIO_OFFSET] as i8
    }

    pub fn run_state(&self) -> u8 {
        self.0[RUN_STATE_OFFSET]
    }

    pub fn tachometer_limit(&self) -> u32 {
        let mut limit = [0u8; 4];
        limit.copy_from_slice(&self.0[TACHO_OFFSET..]);
        u32::from_le_bytes(limit)
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encode one motor state onto `dst`.
///
/// Nothing is written if the state is invalid.
pub fn encode_motor_state(state: &MotorState, dst: &mut BytesMut) -> Result<()> {
    let frame = CommandFrame::from_state(state)?;
    dst.reserve(FRAME_SIZE);
    dst.put_slice(frame.as_bytes());
    Ok(())
}

/// Encode a batch of motor states, in order, into one buffer.
///
/// An invalid state anywhere in the batch yields an error and no output.
pub fn encode(states: &[MotorState]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(FRAME_SIZE * states.len());
    for state in states {
        encode_motor_state(state, &mut dst)?;
    }
    Ok(dst.freeze())
}

fn validate(state: &MotorState) -> Result<()> {
    if !is_valid_motor(state.motor) {
        return Err(CommandError::InvalidMotor(state.motor));
    }
    if !is_valid_power(state.power) {
        return Err(CommandError::InvalidPower(state.power));
    }
    Ok(())
}
