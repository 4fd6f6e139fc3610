// Motor side of the joint
//
// Provides:
// - Dual-PWM H-bridge drive stage with logical polarity swap
// - Direction probe, wiggle and open-loop probe routines

pub mod calibration;
pub mod drive;

pub use calibration::{CalibrationResult, open_loop_probe, probe_direction, wiggle};
pub use drive::{DriveError, DriveStage, DutyPair, MAX_DUTY, clamp_power};
