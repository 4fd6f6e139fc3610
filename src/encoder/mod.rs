// Absolute angle sensors
//
// One sampling call regardless of transport:
// - AS5600 over I2C (12-bit, no integrity check)
// - MT6701 over SSI (14-bit, CRC-6 checked)
// - MT6701 over I2C (14-bit, plus configuration readout)

pub mod as5600;
pub mod mt6701;
pub mod mt6701_i2c;

use embedded_hal::{digital, i2c, spi};
use serde::Serialize;

pub use as5600::As5600;
pub use mt6701::{Mt6701Ssi, SsiFrame};
pub use mt6701_i2c::{Mt6701Config, Mt6701I2c};

/// One absolute reading in `[0, counts_per_rev)`.
///
/// `valid` is false only when the transport carries an integrity check and the
/// check failed. Consumers must not act on `counts` from an invalid sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AngularSample {
    pub counts: u16,
    pub valid: bool,
}

impl AngularSample {
    pub fn verified(counts: u16) -> Self {
        Self {
            counts,
            valid: true,
        }
    }

    pub fn rejected(counts: u16) -> Self {
        Self {
            counts,
            valid: false,
        }
    }
}

/// Bus-level failures while talking to a sensor
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("I2C bus fault: {0:?}")]
    I2c(i2c::ErrorKind),

    #[error("SPI bus fault: {0:?}")]
    Spi(spi::ErrorKind),

    #[error("Chip-select fault: {0:?}")]
    ChipSelect(digital::ErrorKind),

    #[error("No device acknowledged at any of {addresses:02X?}")]
    NotFound { addresses: Vec<u8> },
}

/// A rotary sensor that yields one absolute sample per call.
///
/// Implementations do not retry. A bus fault is returned to the caller.
pub trait AngleSensor {
    /// Modulus of the angle space this sensor reports in
    fn counts_per_rev(&self) -> u16;

    fn sample(&mut self) -> Result<AngularSample, SensorError>;
}
