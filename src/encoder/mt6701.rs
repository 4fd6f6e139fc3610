// MT6701 magnetic encoder, read over SSI
//
// Frame (24 bits, MSB first):
// [23..10] angle (14 bits) | [9..6] status (4 bits) | [5..0] CRC-6
//
// The CRC covers the 18-bit angle+status payload, polynomial x^6 + x + 1.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, OutputPin};
use embedded_hal::spi::{Error as _, SpiBus};
use serde::Serialize;
use tracing::debug;

use super::{AngleSensor, AngularSample, SensorError};
use crate::angle::counts_to_degrees;

pub const COUNTS_PER_REV: u16 = 16384;

/// x^6 + x + 1 with the x^6 term implicit
pub const CRC_POLY: u8 = 0x03;

/// Chip-select low to first clock edge (datasheet t_CSL, with margin)
pub const DEFAULT_SETUP_US: u32 = 10;

/// Chip-select high time before the next frame may start
pub const DEFAULT_HOLD_US: u32 = 5;

const FRAME_BYTES: usize = 3;
const PAYLOAD_BITS: u32 = 18;

/// CRC-6 over the low `bits` bits of `payload`, MSB first
pub fn crc6(payload: u32, bits: u32) -> u8 {
    let mut remainder: u8 = 0;
    for i in (0..bits).rev() {
        let bit = ((payload >> i) & 1) as u8;
        let feedback = ((remainder >> 5) & 1) ^ bit;
        remainder = (remainder << 1) & 0x3F;
        if feedback != 0 {
            remainder ^= CRC_POLY;
        }
    }
    remainder
}

/// Magnetic field strength, from status bits [1:0]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Normal,
    TooStrong,
    TooWeak,
    Reserved,
}

/// A decoded SSI frame. The angle is only meaningful when [`SsiFrame::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SsiFrame {
    pub angle: u16,
    pub status: u8,
    pub crc_received: u8,
    pub crc_calculated: u8,
}

impl SsiFrame {
    /// Decode the low 24 bits of `raw`
    pub fn decode(raw: u32) -> Self {
        let raw = raw & 0x00FF_FFFF;
        let payload = raw >> 6;
        Self {
            angle: ((raw >> 10) & 0x3FFF) as u16,
            status: ((raw >> 6) & 0x0F) as u8,
            crc_received: (raw & 0x3F) as u8,
            crc_calculated: crc6(payload, PAYLOAD_BITS),
        }
    }

    pub fn from_bytes(bytes: [u8; FRAME_BYTES]) -> Self {
        Self::decode(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Build the 24-bit frame a healthy sensor would send
    pub fn encode(angle: u16, status: u8) -> u32 {
        let payload = (u32::from(angle & 0x3FFF) << 4) | u32::from(status & 0x0F);
        (payload << 6) | u32::from(crc6(payload, PAYLOAD_BITS))
    }

    pub fn is_valid(&self) -> bool {
        self.crc_received == self.crc_calculated
    }

    pub fn degrees(&self) -> f32 {
        counts_to_degrees(self.angle, COUNTS_PER_REV)
    }

    pub fn field_status(&self) -> FieldStatus {
        match self.status & 0x03 {
            0 => FieldStatus::Normal,
            1 => FieldStatus::TooStrong,
            2 => FieldStatus::TooWeak,
            _ => FieldStatus::Reserved,
        }
    }

    pub fn button_pressed(&self) -> bool {
        self.status & 0x04 != 0
    }

    pub fn track_lost(&self) -> bool {
        self.status & 0x08 != 0
    }
}

/// SSI reader: chip select, setup delay, 24 clocks, release, hold delay.
///
/// Validity is reported in the sample, never enforced here.
pub struct Mt6701Ssi<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    setup_us: u32,
    hold_us: u32,
}

impl<SPI, CS, D> Mt6701Ssi<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    /// Takes ownership of the bus and deselects the sensor
    pub fn new(spi: SPI, mut cs: CS, delay: D) -> Result<Self, SensorError> {
        cs.set_high()
            .map_err(|e| SensorError::ChipSelect(e.kind()))?;
        Ok(Self {
            spi,
            cs,
            delay,
            setup_us: DEFAULT_SETUP_US,
            hold_us: DEFAULT_HOLD_US,
        })
    }

    pub fn with_timing(mut self, setup_us: u32, hold_us: u32) -> Self {
        self.setup_us = setup_us;
        self.hold_us = hold_us;
        self
    }

    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    /// Capture and decode one frame
    pub fn read_frame(&mut self) -> Result<SsiFrame, SensorError> {
        self.cs
            .set_low()
            .map_err(|e| SensorError::ChipSelect(e.kind()))?;
        self.delay.delay_us(self.setup_us);

        let mut buffer = [0u8; FRAME_BYTES];
        let read = self
            .spi
            .read(&mut buffer)
            .and_then(|()| self.spi.flush())
            .map_err(|e| SensorError::Spi(e.kind()));

        // Deselect even when the transfer failed
        let released = self
            .cs
            .set_high()
            .map_err(|e| SensorError::ChipSelect(e.kind()));
        self.delay.delay_us(self.hold_us);

        read?;
        released?;

        let frame = SsiFrame::from_bytes(buffer);
        if !frame.is_valid() {
            debug!(
                "MT6701 CRC mismatch: raw={:02X?} received={:#04X} calculated={:#04X}",
                buffer, frame.crc_received, frame.crc_calculated
            );
        }
        Ok(frame)
    }
}

impl<SPI, CS, D> AngleSensor for Mt6701Ssi<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    fn counts_per_rev(&self) -> u16 {
        COUNTS_PER_REV
    }

    fn sample(&mut self) -> Result<AngularSample, SensorError> {
        let frame = self.read_frame()?;
        Ok(if frame.is_valid() {
            AngularSample::verified(frame.angle)
        } else {
            AngularSample::rejected(frame.angle)
        })
    }
}
