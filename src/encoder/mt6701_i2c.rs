// MT6701 over I2C: angle readout and EEPROM configuration decode
//
// The angle is split across two registers and must be read high byte first:
// 0x03 holds angle[13:6], 0x04 holds angle[5:0] in bits [7:2].

use embedded_hal::i2c::{Error as _, I2c};
use serde::Serialize;
use tracing::{debug, info};

use super::{AngleSensor, AngularSample, SensorError};

/// Factory default first, then the alternate strap
pub const ADDRESSES: [u8; 2] = [0x06, 0x46];

pub const COUNTS_PER_REV: u16 = 16384;

/// Register map (subset used here)
pub mod reg {
    pub const ANGLE_H: u8 = 0x03;
    pub const ANGLE_L: u8 = 0x04;
    pub const UVW_MUX: u8 = 0x25;
    pub const ABZ_MUX: u8 = 0x29;
    pub const RES: u8 = 0x30;
    pub const ABZ_RES_L: u8 = 0x31;
    pub const ZERO_H: u8 = 0x32;
    pub const ZERO_L: u8 = 0x33;
    pub const HYST_L: u8 = 0x34;
    pub const OUT_MODE: u8 = 0x38;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Analog,
    Pwm,
}

/// Raw bytes of the configuration registers, in register order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigRegisters {
    pub uvw_mux: u8,
    pub abz_mux: u8,
    pub res: u8,
    pub abz_res_l: u8,
    pub zero_h: u8,
    pub zero_l: u8,
    pub hyst_l: u8,
    pub out_mode: u8,
}

/// Decoded sensor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mt6701Config {
    /// QFN only: UVW pins carry -A -B -Z instead
    pub uvw_mux_inverted: bool,
    /// ABZ pins carry UVW instead
    pub abz_mux_uvw: bool,
    pub direction: Direction,
    pub uvw_pole_pairs: u8,
    /// Pulses per revolution on the ABZ interface (1..=1024)
    pub abz_ppr: u16,
    /// Hysteresis table index (0..=7)
    pub hysteresis_code: u8,
    /// Z pulse width table index (0..=7)
    pub z_pulse_width_code: u8,
    /// 12-bit zero offset
    pub zero: u16,
    /// PWM output at ~497 Hz instead of ~994 Hz
    pub pwm_freq_low: bool,
    pub pwm_active_low: bool,
    pub output_mode: OutputMode,
}

impl Mt6701Config {
    pub fn decode(r: &ConfigRegisters) -> Self {
        let hyst2 = (r.zero_h >> 7) & 1;
        let hyst10 = (r.hyst_l >> 6) & 0x03;
        Self {
            uvw_mux_inverted: (r.uvw_mux >> 7) & 1 != 0,
            abz_mux_uvw: (r.abz_mux >> 6) & 1 != 0,
            direction: if (r.abz_mux >> 1) & 1 != 0 {
                Direction::Cw
            } else {
                Direction::Ccw
            },
            uvw_pole_pairs: (r.res >> 4) & 0x0F,
            abz_ppr: (u16::from(r.res & 0x03) << 8) | u16::from(r.abz_res_l),
            hysteresis_code: (hyst2 << 2) | hyst10,
            z_pulse_width_code: (r.zero_h >> 4) & 0x07,
            zero: (u16::from(r.zero_h & 0x0F) << 8) | u16::from(r.zero_l),
            pwm_freq_low: (r.out_mode >> 7) & 1 != 0,
            pwm_active_low: (r.out_mode >> 6) & 1 != 0,
            output_mode: if (r.out_mode >> 5) & 1 != 0 {
                OutputMode::Pwm
            } else {
                OutputMode::Analog
            },
        }
    }

    pub fn zero_degrees(&self) -> f32 {
        f32::from(self.zero) * 360.0 / 4096.0
    }

    pub fn z_pulse_width(&self) -> &'static str {
        match self.z_pulse_width_code {
            0 => "1 LSB",
            1 => "2 LSB",
            2 => "4 LSB",
            3 => "8 LSB",
            4 => "12 LSB",
            5 => "16 LSB",
            6 => "180°",
            _ => "1 LSB (dup)",
        }
    }
}

pub struct Mt6701I2c<I> {
    bus: I,
    address: u8,
}

impl<I: I2c> Mt6701I2c<I> {
    pub fn new(bus: I, address: u8) -> Self {
        Self { bus, address }
    }

    /// Find the sensor at one of the known addresses
    pub fn probe(mut bus: I) -> Result<Self, SensorError> {
        for &address in &ADDRESSES {
            let mut byte = [0u8; 1];
            match bus.write_read(address, &[reg::ANGLE_H], &mut byte) {
                Ok(()) => {
                    info!("MT6701 found at {:#04X}", address);
                    return Ok(Self { bus, address });
                }
                Err(e) => debug!("No MT6701 at {:#04X}: {:?}", address, e.kind()),
            }
        }
        Err(SensorError::NotFound {
            addresses: ADDRESSES.to_vec(),
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I {
        self.bus
    }

    fn read_u8(&mut self, register: u8) -> Result<u8, SensorError> {
        let mut byte = [0u8; 1];
        self.bus
            .write_read(self.address, &[register], &mut byte)
            .map_err(|e| SensorError::I2c(e.kind()))?;
        Ok(byte[0])
    }

    /// 14-bit angle; the high register must be read first to latch the low one
    pub fn read_angle(&mut self) -> Result<u16, SensorError> {
        let hi = self.read_u8(reg::ANGLE_H)?;
        let lo = self.read_u8(reg::ANGLE_L)?;
        Ok(((u16::from(hi) << 6) | (u16::from(lo) >> 2)) & 0x3FFF)
    }

    pub fn read_config(&mut self) -> Result<Mt6701Config, SensorError> {
        let regs = ConfigRegisters {
            uvw_mux: self.read_u8(reg::UVW_MUX)?,
            abz_mux: self.read_u8(reg::ABZ_MUX)?,
            res: self.read_u8(reg::RES)?,
            abz_res_l: self.read_u8(reg::ABZ_RES_L)?,
            zero_h: self.read_u8(reg::ZERO_H)?,
            zero_l: self.read_u8(reg::ZERO_L)?,
            hyst_l: self.read_u8(reg::HYST_L)?,
            out_mode: self.read_u8(reg::OUT_MODE)?,
        };
        Ok(Mt6701Config::decode(&regs))
    }
}

impl<I: I2c> AngleSensor for Mt6701I2c<I> {
    fn counts_per_rev(&self) -> u16 {
        COUNTS_PER_REV
    }

    fn sample(&mut self) -> Result<AngularSample, SensorError> {
        self.read_angle().map(AngularSample::verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
    use std::collections::HashMap;

    /// Register file at a single address; every other address NAKs
    struct FakeBus {
        address: u8,
        registers: HashMap<u8, u8>,
        pointer: u8,
        reads: Vec<u8>,
    }

    impl FakeBus {
        fn new(address: u8, registers: &[(u8, u8)]) -> Self {
            Self {
                address,
                registers: registers.iter().copied().collect(),
                pointer: 0,
                reads: Vec::new(),
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if address != self.address {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.pointer = bytes[0],
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            self.reads.push(self.pointer);
                            *byte = self.registers.get(&self.pointer).copied().unwrap_or(0);
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_probe_falls_back_to_alternate_address() {
        let sensor = Mt6701I2c::probe(FakeBus::new(0x46, &[])).unwrap();
        assert_eq!(sensor.address(), 0x46);
    }

    #[test]
    fn test_probe_reports_missing_sensor() {
        match Mt6701I2c::probe(FakeBus::new(0x36, &[])) {
            Err(SensorError::NotFound { addresses }) => assert_eq!(addresses, vec![0x06, 0x46]),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("probe should fail"),
        }
    }

    #[test]
    fn test_angle_assembled_high_register_first() {
        // angle = 0x2ABC = 0b10_1010_1011_1100
        // hi = angle >> 6 = 0xAA, lo = (angle & 0x3F) << 2 = 0xF0
        let bus = FakeBus::new(0x06, &[(reg::ANGLE_H, 0xAA), (reg::ANGLE_L, 0xF0 | 0x03)]);
        let mut sensor = Mt6701I2c::new(bus, 0x06);
        assert_eq!(sensor.sample().unwrap(), AngularSample::verified(0x2ABC));
        assert_eq!(sensor.release().reads, vec![reg::ANGLE_H, reg::ANGLE_L]);
    }

    #[test]
    fn test_config_decode() {
        let regs = ConfigRegisters {
            uvw_mux: 0x80,
            abz_mux: 0b0100_0010,
            res: 0x73,     // 7 pole pairs, ppr high bits 0b11
            abz_res_l: 0xFF,
            zero_h: 0b1101_0100, // hyst2=1, z width=5, zero high nibble=4
            zero_l: 0x00,
            hyst_l: 0b1000_0000, // hyst[1:0]=0b10
            out_mode: 0b0010_0000,
        };
        let cfg = Mt6701Config::decode(&regs);

        assert!(cfg.uvw_mux_inverted);
        assert!(cfg.abz_mux_uvw);
        assert_eq!(cfg.direction, Direction::Cw);
        assert_eq!(cfg.uvw_pole_pairs, 7);
        assert_eq!(cfg.abz_ppr, 1023);
        assert_eq!(cfg.hysteresis_code, 0b110);
        assert_eq!(cfg.z_pulse_width_code, 5);
        assert_eq!(cfg.z_pulse_width(), "16 LSB");
        assert_eq!(cfg.zero, 0x400);
        assert!((cfg.zero_degrees() - 90.0).abs() < 1e-4);
        assert!(!cfg.pwm_freq_low);
        assert!(!cfg.pwm_active_low);
        assert_eq!(cfg.output_mode, OutputMode::Pwm);
    }

    #[test]
    fn test_read_config_over_bus() {
        let bus = FakeBus::new(0x06, &[(reg::ABZ_MUX, 0x00), (reg::OUT_MODE, 0xC0)]);
        let mut sensor = Mt6701I2c::new(bus, 0x06);
        let cfg = sensor.read_config().unwrap();
        assert_eq!(cfg.direction, Direction::Ccw);
        assert_eq!(cfg.output_mode, OutputMode::Analog);
        assert!(cfg.pwm_freq_low);
        assert!(cfg.pwm_active_low);
    }
}
