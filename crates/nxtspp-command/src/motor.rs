//! Motor ports and the desired state of a motor.
//!
//! Ports 0-2 are the NXT output ports A-C.
//! 0xFF addresses all three ports at once.

/// Output port A.
pub const MOTOR_A: u8 = 0;

/// Output port B.
pub const MOTOR_B: u8 = 1;

/// Output port C.
pub const MOTOR_C: u8 = 2;

/// All output ports.
pub const MOTOR_ALL: u8 = 0xFF;

/// Lowest accepted power.
pub const POWER_MIN: i8 = -100;

/// Highest accepted power.
pub const POWER_MAX: i8 = 100;

/// Returns a human-readable name for a motor id.
pub fn motor_name(id: u8) -> &'static str {
    match id {
        MOTOR_A => "A",
        MOTOR_B => "B",
        MOTOR_C => "C",
        MOTOR_ALL => "ALL",
        _ => "INVALID",
    }
}

/// Parse a motor name (`a`, `b`, `c`, `all`) or numeric id.
pub fn parse_motor(input: &str) -> Option<u8> {
    match input.trim().to_ascii_lowercase().as_str() {
        "a" => Some(MOTOR_A),
        "b" => Some(MOTOR_B),
        "c" => Some(MOTOR_C),
        "all" => Some(MOTOR_ALL),
        other => other.parse::<u8>().ok().filter(|id| is_valid_motor(*id)),
    }
}

/// Returns true if `id` is a port or the all-motors sentinel.
pub fn is_valid_motor(id: u8) -> bool {
    matches!(id, MOTOR_A | MOTOR_B | MOTOR_C | MOTOR_ALL)
}

/// Returns true if `power` is within the accepted range.
pub fn is_valid_power(power: i8) -> bool {
    (POWER_MIN..=POWER_MAX).contains(&power)
}

/// Desired state of one motor.
///
/// Built by the caller and encoded as-is; validation happens at encode time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotorState {
    /// Port id, or [`MOTOR_ALL`].
    pub motor: u8,
    /// Power in -100..=100. Zero stops the motor (coast unless braking).
    pub power: i8,
    /// Actively hold the motor (electronic braking).
    pub brake: bool,
    /// Synchronise with the motors in `synced_motors`.
    pub sync: bool,
    /// Other motors to synchronise with. Does not include `motor` itself.
    pub synced_motors: Vec<u8>,
    /// Turn ratio used while synchronised.
    pub synced_turn_ratio: i8,
    /// Regulate speed under load.
    pub speed_regulation: bool,
    /// Encoder counts to run before stopping; 0 runs forever.
    pub tachometer_limit: u32,
}

impl MotorState {
    /// Run `motor` at `power`, unregulated and without limit.
    pub fn new(motor: u8, power: i8) -> Self {
        Self {
            motor,
            power,
            ..Self::default()
        }
    }

    /// Let `motor` coast to a stop.
    pub fn stop(motor: u8) -> Self {
        Self::new(motor, 0)
    }

    /// Stop `motor` and hold it in place.
    pub fn brake(motor: u8) -> Self {
        Self::new(motor, 0).with_brake()
    }

    /// Enable braking.
    pub fn with_brake(mut self) -> Self {
        self.brake = true;
        self
    }

    /// Enable speed regulation.
    pub fn with_speed_regulation(mut self) -> Self {
        self.speed_regulation = true;
        self
    }

    /// Synchronise with `motors` using `turn_ratio`.
    pub fn with_sync(mut self, motors: &[u8], turn_ratio: i8) -> Self {
        self.sync = true;
        self.synced_motors = motors.iter().copied().filter(|m| *m != self.motor).collect();
        self.synced_turn_ratio = turn_ratio;
        self
    }

    /// Stop after `limit` encoder counts.
    pub fn with_tachometer_limit(mut self, limit: u32) -> Self {
        self.tachometer_limit = limit;
        self
    }
}
