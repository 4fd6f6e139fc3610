// Simulated joint for bench runs and tests
//
// A first-order DC motor model behind the same embedded-hal traits the real
// board exposes: two PWM channels, an I2C bus carrying an AS5600 and an MT6701,
// and an SPI bus carrying the MT6701 SSI port. Simulated time only advances
// through the simulated delay, so runs are deterministic.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource, Operation};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal::spi::{self, SpiBus};

use crate::encoder::mt6701::SsiFrame;
use crate::encoder::{As5600, Mt6701I2c, Mt6701Ssi, SensorError, as5600, mt6701, mt6701_i2c};
use crate::hal::MonotonicClock;

/// Physics integration step
const STEP_NS: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantParams {
    /// Shaft speed at full duty, revolutions per second
    pub max_speed_rps: f64,
    /// Mechanical time constant, seconds
    pub time_constant_s: f64,
    /// Duty fraction below which static friction holds the shaft
    pub deadband: f64,
    /// Motor leads reversed relative to the encoder
    pub inverted_wiring: bool,
    /// Initial shaft angle, revolutions
    pub initial_position_rev: f64,
    /// Native range of the simulated PWM peripheral
    pub pwm_max_duty: u16,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            max_speed_rps: 2.0,
            time_constant_s: 0.05,
            deadband: 0.05,
            inverted_wiring: false,
            initial_position_rev: 0.0,
            pwm_max_duty: 1023,
        }
    }
}

#[derive(Debug)]
struct Plant {
    params: PlantParams,
    position_rev: f64,
    velocity_rps: f64,
    duty_a: u16,
    duty_b: u16,
    now_ns: u64,
    chip_selected: bool,
    transactions: u32,
    fail_from: Option<u32>,
    corrupt_remaining: u32,
    overlaps: u32,
}

impl Plant {
    fn advance(&mut self, ns: u64) {
        let mut remaining = ns;
        while remaining > 0 {
            let step = remaining.min(STEP_NS);
            self.integrate(step as f64 * 1e-9);
            remaining -= step;
        }
        self.now_ns += ns;
    }

    fn integrate(&mut self, dt: f64) {
        let max = f64::from(self.params.pwm_max_duty);
        let mut drive = (f64::from(self.duty_a) - f64::from(self.duty_b)) / max;
        if self.params.inverted_wiring {
            drive = -drive;
        }
        let target = if drive.abs() < self.params.deadband {
            0.0
        } else {
            drive * self.params.max_speed_rps
        };
        let alpha = 1.0 - (-dt / self.params.time_constant_s).exp();
        self.velocity_rps += (target - self.velocity_rps) * alpha;
        self.position_rev += self.velocity_rps * dt;
    }

    fn counts(&self, modulus: u16) -> u16 {
        let m = u32::from(modulus);
        ((self.position_rev.rem_euclid(1.0) * f64::from(m)) as u32 % m) as u16
    }

    /// Count a bus transaction; true when it should fail
    fn begin_transaction(&mut self) -> bool {
        self.transactions += 1;
        self.fail_from.is_some_and(|n| self.transactions >= n)
    }

    fn register(&self, address: u8, register: u8) -> u8 {
        match address {
            as5600::ADDRESS => {
                let raw = self.counts(as5600::COUNTS_PER_REV);
                match register {
                    0x0C => (raw >> 8) as u8,
                    0x0D => raw as u8,
                    _ => 0,
                }
            }
            _ => {
                let angle = self.counts(mt6701::COUNTS_PER_REV);
                match register {
                    mt6701_i2c::reg::ANGLE_H => (angle >> 6) as u8,
                    mt6701_i2c::reg::ANGLE_L => ((angle & 0x3F) << 2) as u8,
                    _ => 0,
                }
            }
        }
    }
}

type Shared = Arc<Mutex<Plant>>;

fn lock(plant: &Shared) -> MutexGuard<'_, Plant> {
    plant.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one simulated joint; clones share the same plant
#[derive(Debug, Clone)]
pub struct SimJoint {
    plant: Shared,
}

impl SimJoint {
    pub fn new(params: PlantParams) -> Self {
        let plant = Plant {
            params,
            position_rev: params.initial_position_rev,
            velocity_rps: 0.0,
            duty_a: 0,
            duty_b: 0,
            now_ns: 0,
            chip_selected: false,
            transactions: 0,
            fail_from: None,
            corrupt_remaining: 0,
            overlaps: 0,
        };
        Self {
            plant: Arc::new(Mutex::new(plant)),
        }
    }

    pub fn forward_pwm(&self) -> SimPwm {
        SimPwm {
            plant: self.plant.clone(),
            side: Side::A,
        }
    }

    pub fn reverse_pwm(&self) -> SimPwm {
        SimPwm {
            plant: self.plant.clone(),
            side: Side::B,
        }
    }

    pub fn i2c(&self) -> SimI2c {
        SimI2c {
            plant: self.plant.clone(),
            pointer: 0,
        }
    }

    pub fn as5600(&self) -> As5600<SimI2c> {
        As5600::new(self.i2c())
    }

    pub fn mt6701_i2c(&self) -> Mt6701I2c<SimI2c> {
        Mt6701I2c::new(self.i2c(), mt6701_i2c::ADDRESSES[0])
    }

    pub fn mt6701_ssi(&self) -> Result<Mt6701Ssi<SimSpi, SimChipSelect, SimDelay>, SensorError> {
        let spi = SimSpi {
            plant: self.plant.clone(),
        };
        let cs = SimChipSelect {
            plant: self.plant.clone(),
        };
        Mt6701Ssi::new(spi, cs, self.delay())
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            plant: self.plant.clone(),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            plant: self.plant.clone(),
        }
    }

    /// Native duties on the (A, B) physical channels
    pub fn duties(&self) -> (u16, u16) {
        let plant = lock(&self.plant);
        (plant.duty_a, plant.duty_b)
    }

    pub fn now_us(&self) -> u64 {
        lock(&self.plant).now_ns / 1_000
    }

    pub fn position_counts(&self, modulus: u16) -> u16 {
        lock(&self.plant).counts(modulus)
    }

    /// Make the `n`-th bus transaction (1-based, counted since creation) and every later one fail
    pub fn fail_bus_transaction(&self, n: u32) {
        lock(&self.plant).fail_from = Some(n);
    }

    /// Flip one payload bit in each of the next `frames` SSI frames
    pub fn corrupt_frames(&self, frames: u32) {
        lock(&self.plant).corrupt_remaining = frames;
    }

    pub fn bus_transactions(&self) -> u32 {
        lock(&self.plant).transactions
    }

    /// Number of writes that left both bridge channels energized
    pub fn overlaps(&self) -> u32 {
        lock(&self.plant).overlaps
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    A,
    B,
}

pub struct SimPwm {
    plant: Shared,
    side: Side,
}

impl pwm::ErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        lock(&self.plant).params.pwm_max_duty
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let mut plant = lock(&self.plant);
        match self.side {
            Side::A => plant.duty_a = duty,
            Side::B => plant.duty_b = duty,
        }
        if plant.duty_a != 0 && plant.duty_b != 0 {
            plant.overlaps += 1;
        }
        Ok(())
    }
}

pub struct SimI2c {
    plant: Shared,
    pointer: u8,
}

impl i2c::ErrorType for SimI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for SimI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut plant = lock(&self.plant);
        if plant.begin_transaction() {
            return Err(i2c::ErrorKind::Bus);
        }
        if address != as5600::ADDRESS && address != mt6701_i2c::ADDRESSES[0] {
            return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some(&register) = bytes.first() {
                        self.pointer = register;
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = plant.register(address, self.pointer);
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct SimSpi {
    plant: Shared,
}

impl spi::ErrorType for SimSpi {
    type Error = spi::ErrorKind;
}

impl SpiBus<u8> for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut plant = lock(&self.plant);
        if plant.begin_transaction() {
            return Err(spi::ErrorKind::Other);
        }
        if !plant.chip_selected {
            words.fill(0xFF);
            return Ok(());
        }

        let mut frame = SsiFrame::encode(plant.counts(mt6701::COUNTS_PER_REV), 0);
        if plant.corrupt_remaining > 0 {
            plant.corrupt_remaining -= 1;
            frame ^= 1 << 12;
        }
        let bytes = frame.to_be_bytes();
        for (word, byte) in words.iter_mut().zip(&bytes[1..]) {
            *word = *byte;
        }
        Ok(())
    }

    fn write(&mut self, _words: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], _write: &[u8]) -> Result<(), Self::Error> {
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.read(words)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Active-low chip select
pub struct SimChipSelect {
    plant: Shared,
}

impl digital::ErrorType for SimChipSelect {
    type Error = Infallible;
}

impl OutputPin for SimChipSelect {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        lock(&self.plant).chip_selected = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        lock(&self.plant).chip_selected = false;
        Ok(())
    }
}

pub struct SimClock {
    plant: Shared,
}

impl MonotonicClock for SimClock {
    fn ticks_us(&self) -> u32 {
        (lock(&self.plant).now_ns / 1_000) as u32
    }

    fn ticks_ms(&self) -> u32 {
        (lock(&self.plant).now_ns / 1_000_000) as u32
    }
}

/// Advances simulated time (and the plant) instead of sleeping
pub struct SimDelay {
    plant: Shared,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        lock(&self.plant).advance(u64::from(ns));
    }
}
