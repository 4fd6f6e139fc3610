// AS5600 12-bit magnetic encoder, read over I2C
//
// A single two-byte read of RAW ANGLE (0x0C..0x0D, big-endian, upper nibble unused).

use embedded_hal::i2c::{Error as _, I2c};
use tracing::trace;

use super::{AngleSensor, AngularSample, SensorError};

/// Fixed 7-bit device address
pub const ADDRESS: u8 = 0x36;

/// RAW ANGLE high byte; the low byte follows at 0x0D
pub const RAW_ANGLE_REGISTER: u8 = 0x0C;

pub const COUNTS_PER_REV: u16 = 4096;

const ANGLE_MASK: u16 = 0x0FFF;

pub struct As5600<I> {
    bus: I,
    address: u8,
}

impl<I: I2c> As5600<I> {
    pub fn new(bus: I) -> Self {
        Self::with_address(bus, ADDRESS)
    }

    /// For boards that put the sensor behind an address translator
    pub fn with_address(bus: I, address: u8) -> Self {
        Self { bus, address }
    }

    /// Give back the bus
    pub fn release(self) -> I {
        self.bus
    }

    /// Read the unfiltered 12-bit angle
    pub fn read_raw_angle(&mut self) -> Result<u16, SensorError> {
        let mut buffer = [0u8; 2];
        self.bus
            .write_read(self.address, &[RAW_ANGLE_REGISTER], &mut buffer)
            .map_err(|e| SensorError::I2c(e.kind()))?;

        let raw = u16::from_be_bytes(buffer) & ANGLE_MASK;
        trace!("AS5600 raw angle {}", raw);
        Ok(raw)
    }
}

impl<I: I2c> AngleSensor for As5600<I> {
    fn counts_per_rev(&self) -> u16 {
        COUNTS_PER_REV
    }

    fn sample(&mut self) -> Result<AngularSample, SensorError> {
        self.read_raw_angle().map(AngularSample::verified)
    }
}
