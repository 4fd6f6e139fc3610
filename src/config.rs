// Default gains, safety limits and timing for the joint controller
use crate::pid::{PidGains, PidLimits};

// PID gains tuned for the bench joint (AS5600, 4096 counts/rev)
pub const DEFAULT_GAINS: PidGains = PidGains {
    kp: 1.5,
    ki: 5.0,
    kd: 0.1,
};

// Anti-windup clamp on the integral contribution
pub const MAX_I_TERM: f32 = 1000.0;

// Matches the full-scale logical duty of the drive stage
pub const MAX_OUTPUT: f32 = 1023.0;

// Derivative is only used when dt exceeds this fraction of the nominal interval
pub const DERIVATIVE_MIN_DT_FRACTION: f32 = 0.3;

pub const DEFAULT_LIMITS: PidLimits = PidLimits {
    max_i_term: MAX_I_TERM,
    max_output: MAX_OUTPUT,
    derivative_min_dt_fraction: DERIVATIVE_MIN_DT_FRACTION,
};

// Control run
pub const DEFAULT_RUN_MS: u32 = 2000;
pub const DEFAULT_INTERVAL_US: u32 = 10_000;
pub const DEFAULT_INCREMENT: i32 = 400;

// Direction probe: roughly half power for a short dwell
pub const CALIBRATION_POWER: i32 = 500;
pub const CALIBRATION_DWELL_MS: u32 = 100;

// Boot wiggle
pub const WIGGLE_PULSES: u32 = 3;
pub const WIGGLE_POWER: i32 = 200;
pub const WIGGLE_ON_MS: u32 = 50;
pub const WIGGLE_OFF_MS: u32 = 50;
// Let the joint come to rest before probing direction
pub const SETTLE_MS: u32 = 500;
