// One-shot motor routines that run before closed-loop control
//
// Each routine owns the drive stage for its duration and always leaves the
// motor commanded to zero, including when a sensor read fails part-way.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use serde::Serialize;
use tracing::{debug, info};

use super::drive::DriveStage;
use crate::angle::angle_diff;
use crate::encoder::{AngleSensor, AngularSample};
use crate::error::ControlError;
use crate::hal::{MonotonicClock, ticks_diff};

/// Outcome of the direction probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalibrationResult {
    pub before: u16,
    pub after: u16,
    /// Shortest signed rotation from `before` to `after`
    pub delta: i32,
    /// Positive power moved the encoder backwards (or not at all)
    pub inverted: bool,
}

/// Drive a fixed positive power for `dwell_ms` and compare encoder readings.
///
/// Does not touch polarity; the caller decides whether to swap.
pub fn probe_direction<A, B, S, D>(
    drive: &mut DriveStage<A, B>,
    sensor: &mut S,
    delay: &mut D,
    power: i32,
    dwell_ms: u32,
) -> Result<CalibrationResult, ControlError>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
    S: AngleSensor,
    D: DelayNs,
{
    drive.set_power(power)?;
    let measured = sample_pair(sensor, delay, dwell_ms);
    let stopped = drive.stop();

    let (before, after) = measured?;
    stopped?;

    let delta = angle_diff(after, before, sensor.counts_per_rev());
    let result = CalibrationResult {
        before,
        after,
        delta,
        inverted: delta <= 0,
    };
    info!(
        "Direction probe: e1={} e2={} delta={} inverted={}",
        before, after, delta, result.inverted
    );
    Ok(result)
}

fn sample_pair<S, D>(
    sensor: &mut S,
    delay: &mut D,
    dwell_ms: u32,
) -> Result<(u16, u16), ControlError>
where
    S: AngleSensor,
    D: DelayNs,
{
    let before = verified(sensor.sample()?)?;
    delay.delay_ms(dwell_ms);
    let after = verified(sensor.sample()?)?;
    Ok((before, after))
}

fn verified(sample: AngularSample) -> Result<u16, ControlError> {
    if sample.valid {
        Ok(sample.counts)
    } else {
        Err(ControlError::UnverifiedSample {
            operation: "direction probe",
        })
    }
}

/// Short visible/audible pulses to show the joint is alive
pub fn wiggle<A, B, D>(
    drive: &mut DriveStage<A, B>,
    delay: &mut D,
    pulses: u32,
    power: i32,
    on_ms: u32,
    off_ms: u32,
) -> Result<(), ControlError>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
    D: DelayNs,
{
    for _ in 0..pulses {
        drive.set_power(power)?;
        delay.delay_ms(on_ms);
        drive.stop()?;
        delay.delay_ms(off_ms);
    }
    Ok(())
}

/// Hold a constant power and record the encoder every `interval_ms`.
///
/// Useful to check wiring and sensor noise before tuning.
pub fn open_loop_probe<A, B, S, C, D>(
    drive: &mut DriveStage<A, B>,
    sensor: &mut S,
    clock: &C,
    delay: &mut D,
    power: i32,
    duration_ms: u32,
    interval_ms: u32,
) -> Result<Vec<AngularSample>, ControlError>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
    S: AngleSensor,
    C: MonotonicClock,
    D: DelayNs,
{
    drive.set_power(power)?;
    let mut samples = Vec::new();
    let recorded = record_samples(sensor, clock, delay, duration_ms, interval_ms, &mut samples);
    let stopped = drive.stop();

    recorded?;
    stopped?;
    Ok(samples)
}

fn record_samples<S, C, D>(
    sensor: &mut S,
    clock: &C,
    delay: &mut D,
    duration_ms: u32,
    interval_ms: u32,
    samples: &mut Vec<AngularSample>,
) -> Result<(), ControlError>
where
    S: AngleSensor,
    C: MonotonicClock,
    D: DelayNs,
{
    let start = clock.ticks_ms();
    while i64::from(ticks_diff(clock.ticks_ms(), start)) < i64::from(duration_ms) {
        let sample = sensor.sample()?;
        debug!("Encoder: {} (valid={})", sample.counts, sample.valid);
        samples.push(sample);
        delay.delay_ms(interval_ms);
    }
    Ok(())
}
