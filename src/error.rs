// Errors that end a control run or a calibration routine
//
// Non-fatal conditions (CRC mismatch, saturation, degenerate dt) are not errors:
// they are logged and counted in the run summary.

use crate::encoder::SensorError;
use crate::motor::DriveError;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Bus fault while sampling the encoder
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),

    #[error("Control interval must be non-zero")]
    InvalidInterval,

    #[error("Target {target} is outside 0..{counts_per_rev}")]
    TargetOutOfRange { target: u16, counts_per_rev: u16 },

    /// A one-shot routine needs data it can trust and got a failed CRC
    #[error("{operation} needs a verified encoder sample")]
    UnverifiedSample { operation: &'static str },
}
