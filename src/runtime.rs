// Closed-loop position control for one joint
//
// One owner for the drive stage, the encoder and the PID state. A run is a
// fixed-rate loop: sample -> PID -> drive -> sleep, bounded by a deadline and
// a cancel token. Every exit path commands the motor to zero.

use std::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use tracing::{debug, error, info, warn};

use crate::angle::normalize;
use crate::config::{
    CALIBRATION_DWELL_MS, CALIBRATION_POWER, SETTLE_MS, WIGGLE_OFF_MS, WIGGLE_ON_MS,
    WIGGLE_POWER, WIGGLE_PULSES,
};
use crate::encoder::{AngleSensor, AngularSample};
use crate::error::ControlError;
use crate::hal::{CancelToken, MonotonicClock, ticks_diff};
use crate::messages::{ControllerState, CycleReport, RunSummary, StopReason};
use crate::motor::{self, CalibrationResult, DriveStage, DutyPair};
use crate::pid::{Pid, PidGains, PidLimits, PidStep};

pub struct MotorController<A, B, S, C, D>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
{
    drive: DriveStage<A, B>,
    sensor: S,
    clock: C,
    delay: D,
    gains: PidGains,
    limits: PidLimits,
    state: ControllerState,
    calibration: Option<CalibrationResult>,
}

impl<A, B, S, C, D> MotorController<A, B, S, C, D>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
    S: AngleSensor,
    C: MonotonicClock,
    D: DelayNs,
{
    pub fn new(drive: DriveStage<A, B>, sensor: S, clock: C, delay: D) -> Self {
        Self {
            drive,
            sensor,
            clock,
            delay,
            gains: PidGains::default(),
            limits: PidLimits::default(),
            state: ControllerState::Idle,
            calibration: None,
        }
    }

    pub fn with_gains(mut self, gains: PidGains) -> Self {
        self.gains = gains;
        self
    }

    pub fn with_limits(mut self, limits: PidLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Takes effect from the next run
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        info!("PID updated to {}", gains);
    }

    pub fn limits(&self) -> PidLimits {
        self.limits
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn counts_per_rev(&self) -> u16 {
        self.sensor.counts_per_rev()
    }

    pub fn calibration(&self) -> Option<CalibrationResult> {
        self.calibration
    }

    pub fn is_polarity_swapped(&self) -> bool {
        self.drive.is_swapped()
    }

    pub fn read_position(&mut self) -> Result<AngularSample, ControlError> {
        Ok(self.sensor.sample()?)
    }

    /// Open-loop power command, clamped to the drive range
    pub fn set_motor(&mut self, power: i32) -> Result<DutyPair, ControlError> {
        Ok(self.drive.set_power(power)?)
    }

    /// Probe which way positive power turns the encoder and swap polarity if needed.
    ///
    /// Run once per session, before closed-loop control.
    pub fn calibrate_direction(&mut self) -> Result<CalibrationResult, ControlError> {
        let result = motor::probe_direction(
            &mut self.drive,
            &mut self.sensor,
            &mut self.delay,
            CALIBRATION_POWER,
            CALIBRATION_DWELL_MS,
        )?;
        if result.inverted {
            warn!("Motor direction is wrong, swapping drive polarity");
            self.drive.swap_polarity()?;
        }
        self.calibration = Some(result);
        Ok(result)
    }

    /// Announce pulses, a settle pause, then direction calibration
    pub fn bring_up(&mut self) -> Result<CalibrationResult, ControlError> {
        motor::wiggle(
            &mut self.drive,
            &mut self.delay,
            WIGGLE_PULSES,
            WIGGLE_POWER,
            WIGGLE_ON_MS,
            WIGGLE_OFF_MS,
        )?;
        self.delay.delay_ms(SETTLE_MS);
        self.calibrate_direction()
    }

    /// Hold `power` open-loop and record the encoder every `interval_ms`
    pub fn open_loop_probe(
        &mut self,
        power: i32,
        duration_ms: u32,
        interval_ms: u32,
    ) -> Result<Vec<AngularSample>, ControlError> {
        motor::open_loop_probe(
            &mut self.drive,
            &mut self.sensor,
            &self.clock,
            &mut self.delay,
            power,
            duration_ms,
            interval_ms,
        )
    }

    /// Move by `increment` counts from wherever the joint is now
    pub fn step_to_offset(
        &mut self,
        increment: i32,
        duration_ms: u32,
        interval_us: u32,
        cancel: &CancelToken,
    ) -> Result<RunSummary, ControlError> {
        self.step_to_offset_with(increment, duration_ms, interval_us, cancel, |_| {})
    }

    pub fn step_to_offset_with<F>(
        &mut self,
        increment: i32,
        duration_ms: u32,
        interval_us: u32,
        cancel: &CancelToken,
        on_cycle: F,
    ) -> Result<RunSummary, ControlError>
    where
        F: FnMut(&CycleReport),
    {
        let target = match self.step_target(increment) {
            Ok(target) => target,
            Err(e) => return self.abort(e),
        };
        self.run_pid_with(target, duration_ms, interval_us, cancel, on_cycle)
    }

    fn step_target(&mut self, increment: i32) -> Result<u16, ControlError> {
        let current = self.sensor.sample()?;
        if !current.valid {
            return Err(ControlError::UnverifiedSample {
                operation: "step target",
            });
        }
        let counts_per_rev = self.counts_per_rev();
        let offset = increment.rem_euclid(i32::from(counts_per_rev));
        let target = normalize(i32::from(current.counts) + offset, counts_per_rev);
        info!(
            "Stepping {} counts: {} -> {}",
            increment, current.counts, target
        );
        Ok(target)
    }

    /// Release the motor and hand back `e`
    fn abort<T>(&mut self, e: ControlError) -> Result<T, ControlError> {
        error!("PID run aborted: {}", e);
        if let Err(release_err) = self.drive.stop() {
            error!("Failed to release motor after abort: {}", release_err);
        }
        Err(e)
    }

    pub fn run_pid(
        &mut self,
        target: u16,
        duration_ms: u32,
        interval_us: u32,
        cancel: &CancelToken,
    ) -> Result<RunSummary, ControlError> {
        self.run_pid_with(target, duration_ms, interval_us, cancel, |_| {})
    }

    /// Run the loop for `duration_ms`, handing every cycle's report to `on_cycle`.
    ///
    /// A bus fault ends the run with an error. The motor is at zero on return
    /// in every case.
    pub fn run_pid_with<F>(
        &mut self,
        target: u16,
        duration_ms: u32,
        interval_us: u32,
        cancel: &CancelToken,
        on_cycle: F,
    ) -> Result<RunSummary, ControlError>
    where
        F: FnMut(&CycleReport),
    {
        if let Err(e) = self.check_run_args(target, interval_us) {
            return self.abort(e);
        }

        info!(
            "PID run: target={} duration={}ms interval={}us gains {}",
            target, duration_ms, interval_us, self.gains
        );
        self.state = ControllerState::Running;
        let outcome = self.control_loop(target, duration_ms, interval_us, cancel, on_cycle);
        self.state = ControllerState::Stopped;

        match outcome {
            Ok(summary) => {
                if let Err(e) = self.drive.stop() {
                    return self.abort(e.into());
                }
                info!(
                    "PID run finished ({:?}) after {} cycles, final error {:?}",
                    summary.stop_reason, summary.cycles, summary.final_error
                );
                Ok(summary)
            }
            Err(e) => self.abort(e),
        }
    }

    fn check_run_args(&self, target: u16, interval_us: u32) -> Result<(), ControlError> {
        if interval_us == 0 {
            return Err(ControlError::InvalidInterval);
        }
        let counts_per_rev = self.counts_per_rev();
        if target >= counts_per_rev {
            return Err(ControlError::TargetOutOfRange {
                target,
                counts_per_rev,
            });
        }
        Ok(())
    }

    fn control_loop<F>(
        &mut self,
        target: u16,
        duration_ms: u32,
        interval_us: u32,
        cancel: &CancelToken,
        mut on_cycle: F,
    ) -> Result<RunSummary, ControlError>
    where
        F: FnMut(&CycleReport),
    {
        let counts_per_rev = self.counts_per_rev();
        let (gains, limits) = (self.gains, self.limits);
        let start_ms = self.clock.ticks_ms();

        // Seed dt and velocity for the first cycle. A seed with a bad CRC is
        // discarded; the PID then starts from the first verified cycle.
        let mut last_sample_us = self.clock.ticks_us();
        let seed = self.sensor.sample()?;
        let seeded = |pos: u16, at_us: u32| {
            Pid::new(gains, limits, interval_us, counts_per_rev, pos, at_us)
        };
        let mut pid = if seed.valid {
            Some(seeded(seed.counts, last_sample_us))
        } else {
            warn!("Seed sample failed its CRC, waiting for a verified frame");
            None
        };
        let mut summary = RunSummary::new(target, self.gains);
        let mut command = 0;
        let mut rejected_streak = 0u32;

        loop {
            let elapsed_ms = ticks_diff(self.clock.ticks_ms(), start_ms);
            if i64::from(elapsed_ms) >= i64::from(duration_ms) {
                summary.stop_reason = StopReason::Deadline;
                break;
            }
            if cancel.is_cancelled() {
                warn!("PID run cancelled after {} cycles", summary.cycles);
                summary.stop_reason = StopReason::Cancelled;
                break;
            }

            let now = self.clock.ticks_us();
            // A bus fault ends the run here, before anything is driven
            let sample = self.sensor.sample()?;

            let step = if sample.valid {
                rejected_streak = 0;
                let pid = pid.get_or_insert_with(|| seeded(sample.counts, last_sample_us));
                let step = pid.update(target, sample.counts, now);
                self.report_step(now, sample.counts, &step);
                // truncates toward zero, saturating
                command = step.output as i32;
                Some(step)
            } else {
                rejected_streak += 1;
                // hold the last command for one cycle, then coast until a good frame
                if rejected_streak > 1 {
                    command = 0;
                }
                warn!(
                    "Discarding sample with bad CRC ({} in a row), command {}",
                    rejected_streak, command
                );
                None
            };

            self.drive.set_power(command)?;

            let report = CycleReport {
                cycle: summary.cycles + 1,
                t_us: now,
                sample,
                pid: step,
                command,
            };
            summary.record(&report);
            on_cycle(&report);
            last_sample_us = now;

            self.delay.delay_us(interval_us);
        }

        Ok(summary)
    }

    fn report_step(&self, now: u32, pos: u16, step: &PidStep) {
        if step.derivative_suppressed {
            warn!("dt too small ({:.6}s), derivative term zeroed", step.dt);
        }
        if step.i_saturated {
            warn!("I term saturated to {:.1}", step.iterm);
        }
        if step.output_saturated {
            warn!("Output saturated to {:.1}", step.output);
        }
        debug!(
            "t:{} dt:{:.6} pos:{} err:{} vel:{} p:{:.4} d:{:.4} i:{:.4} out:{:.2}",
            now,
            step.dt,
            pos,
            step.error,
            step.velocity,
            step.pterm,
            step.dterm,
            step.iterm,
            step.output
        );
    }
}

impl<A, B, S, C, D> fmt::Display for MotorController<A, B, S, C, D>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
    S: AngleSensor,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "encoder {} counts/rev, polarity {}, PID param {}, limits i={} out={}",
            self.sensor.counts_per_rev(),
            if self.drive.is_swapped() {
                "swapped"
            } else {
                "normal"
            },
            self.gains,
            self.limits.max_i_term,
            self.limits.max_output
        )
    }
}

impl<A, B, S, C, D> Drop for MotorController<A, B, S, C, D>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
{
    fn drop(&mut self) {
        // Never leave the bridge energized (safety measure)
        if let Err(e) = self.drive.stop() {
            warn!("Failed to stop motor on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::angle_diff;
    use crate::encoder::{As5600, Mt6701Ssi, SensorError};
    use crate::sim::{
        PlantParams, SimChipSelect, SimClock, SimDelay, SimI2c, SimJoint, SimPwm, SimSpi,
    };

    type I2cController = MotorController<SimPwm, SimPwm, As5600<SimI2c>, SimClock, SimDelay>;
    type SsiSensor = Mt6701Ssi<SimSpi, SimChipSelect, SimDelay>;
    type SsiController = MotorController<SimPwm, SimPwm, SsiSensor, SimClock, SimDelay>;

    fn joint(params: PlantParams) -> SimJoint {
        SimJoint::new(params)
    }

    fn i2c_controller(joint: &SimJoint) -> I2cController {
        let drive = DriveStage::new(joint.forward_pwm(), joint.reverse_pwm()).unwrap();
        MotorController::new(drive, joint.as5600(), joint.clock(), joint.delay())
    }

    fn ssi_controller(joint: &SimJoint) -> SsiController {
        let drive = DriveStage::new(joint.forward_pwm(), joint.reverse_pwm()).unwrap();
        MotorController::new(drive, joint.mt6701_ssi().unwrap(), joint.clock(), joint.delay())
    }

    const GENTLE: PidGains = PidGains {
        kp: 0.5,
        ki: 0.0,
        kd: 0.0,
    };

    #[test]
    fn test_run_lasts_full_duration() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);
        assert_eq!(ctl.state(), ControllerState::Idle);

        let summary = ctl.run_pid(0, 200, 10_000, &CancelToken::new()).unwrap();
        assert_eq!(summary.cycles, 20);
        assert_eq!(summary.stop_reason, StopReason::Deadline);
        assert_eq!(ctl.state(), ControllerState::Stopped);
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_bus_fault_aborts_run_and_releases_motor() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint).with_gains(GENTLE);

        // transaction 1 is the seed read; cycle k reads transaction k + 1
        joint.fail_bus_transaction(11);
        let mut cycles_seen = Vec::new();
        let result = ctl.run_pid_with(2000, 200, 10_000, &CancelToken::new(), |r| {
            cycles_seen.push(r.cycle)
        });

        match result {
            Err(ControlError::Sensor(SensorError::I2c(_))) => {}
            other => panic!("expected bus fault, got {:?}", other.map(|s| s.cycles)),
        }
        // cycles 1..=9 completed, cycle 10 faulted before driving
        assert_eq!(cycles_seen, (1..=9).collect::<Vec<_>>());
        assert_eq!(joint.duties(), (0, 0));
        assert_eq!(joint.bus_transactions(), 11);
        assert_eq!(ctl.state(), ControllerState::Stopped);
    }

    #[test]
    fn test_motor_was_driven_before_fault() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint).with_gains(GENTLE);
        joint.fail_bus_transaction(6);

        let mut last_command = 0;
        let _ = ctl.run_pid_with(2000, 200, 10_000, &CancelToken::new(), |r| {
            last_command = r.command
        });
        assert!(last_command > 0);
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_step_converges_toward_target() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint).with_gains(GENTLE);

        let summary = ctl
            .step_to_offset(800, 1000, 10_000, &CancelToken::new())
            .unwrap();
        assert_eq!(summary.target, 800);
        assert_eq!(summary.cycles, 100);

        let pos = joint.position_counts(4096);
        let remaining = angle_diff(summary.target, pos, 4096).abs();
        assert!(remaining < 200, "still {} counts away", remaining);
        assert_eq!(joint.overlaps(), 0);
    }

    #[test]
    fn test_step_wraps_target_across_zero() {
        let joint = joint(PlantParams {
            initial_position_rev: 3900.0 / 4096.0,
            ..PlantParams::default()
        });
        let mut ctl = i2c_controller(&joint).with_gains(GENTLE);

        let summary = ctl
            .step_to_offset(400, 1000, 10_000, &CancelToken::new())
            .unwrap();
        assert_eq!(summary.target, 204);

        // moved forward through zero rather than the long way round
        let pos = joint.position_counts(4096);
        assert!(angle_diff(204, pos, 4096).abs() < 200, "ended at {}", pos);
    }

    #[test]
    fn test_calibration_fixes_swapped_wiring() {
        let joint = joint(PlantParams {
            inverted_wiring: true,
            ..PlantParams::default()
        });
        let mut ctl = i2c_controller(&joint).with_gains(GENTLE);

        let result = ctl.calibrate_direction().unwrap();
        assert!(result.inverted);
        assert!(ctl.is_polarity_swapped());
        assert_eq!(joint.duties(), (0, 0));

        // Closed loop now pushes the right way
        let summary = ctl
            .step_to_offset(600, 1000, 10_000, &CancelToken::new())
            .unwrap();
        let pos = joint.position_counts(4096);
        assert!(angle_diff(summary.target, pos, 4096).abs() < 200);
    }

    #[test]
    fn test_bring_up_on_correct_wiring_keeps_polarity() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);

        let result = ctl.bring_up().unwrap();
        assert!(!result.inverted);
        assert!(!ctl.is_polarity_swapped());
        assert_eq!(ctl.calibration(), Some(result));
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_cancel_stops_run_early() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint).with_gains(GENTLE);
        let cancel = CancelToken::new();

        let trip = cancel.clone();
        let summary = ctl
            .run_pid_with(1000, 2000, 10_000, &cancel, |r| {
                if r.cycle == 5 {
                    trip.cancel();
                }
            })
            .unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.cycles, 5);
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_single_crc_mismatch_holds_previous_command() {
        let joint = joint(PlantParams::default());
        let mut ctl = ssi_controller(&joint).with_gains(GENTLE);
        let mut reports = Vec::new();

        // cycle 5 gets a corrupted frame
        let summary = ctl
            .run_pid_with(4000, 100, 10_000, &CancelToken::new(), |r| {
                if r.cycle == 4 {
                    joint.corrupt_frames(1);
                }
                reports.push(r.clone());
            })
            .unwrap();

        assert_eq!(summary.crc_mismatches, 1);
        let bad = &reports[4];
        assert!(bad.pid.is_none());
        assert!(!bad.sample.valid);
        assert_eq!(bad.command, reports[3].command);
        assert!(bad.command != 0);
        assert!(reports[5].pid.is_some());
    }

    #[test]
    fn test_repeated_crc_mismatch_coasts() {
        let joint = joint(PlantParams::default());
        let mut ctl = ssi_controller(&joint).with_gains(GENTLE);
        let mut reports = Vec::new();

        let summary = ctl
            .run_pid_with(4000, 100, 10_000, &CancelToken::new(), |r| {
                if r.cycle == 2 {
                    joint.corrupt_frames(3);
                }
                reports.push(r.clone());
            })
            .unwrap();

        assert_eq!(summary.crc_mismatches, 3);
        assert_eq!(reports[2].command, reports[1].command);
        assert_eq!(reports[3].command, 0);
        assert_eq!(reports[4].command, 0);
        // recovers once frames are good again
        assert!(reports[5].pid.is_some());
        assert_eq!(summary.cycles, 10);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);
        let cancel = CancelToken::new();

        assert!(matches!(
            ctl.run_pid(0, 100, 0, &cancel),
            Err(ControlError::InvalidInterval)
        ));
        assert!(matches!(
            ctl.run_pid(4096, 100, 10_000, &cancel),
            Err(ControlError::TargetOutOfRange { .. })
        ));
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[test]
    fn test_rejected_arguments_release_motor() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);
        let cancel = CancelToken::new();

        ctl.set_motor(700).unwrap();
        assert!(ctl.run_pid(0, 200, 0, &cancel).is_err());
        assert_eq!(joint.duties(), (0, 0));

        ctl.set_motor(-700).unwrap();
        assert!(ctl.run_pid(4096, 200, 10_000, &cancel).is_err());
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_step_bus_fault_releases_motor() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);
        ctl.set_motor(700).unwrap();

        // the very next read is the step's starting position
        joint.fail_bus_transaction(joint.bus_transactions() + 1);
        let result = ctl.step_to_offset(400, 200, 10_000, &CancelToken::new());

        assert!(matches!(
            result,
            Err(ControlError::Sensor(SensorError::I2c(_)))
        ));
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_step_with_bad_start_frame_releases_motor() {
        let joint = joint(PlantParams::default());
        let mut ctl = ssi_controller(&joint);
        ctl.set_motor(700).unwrap();
        joint.corrupt_frames(1);

        let result = ctl.step_to_offset(400, 200, 10_000, &CancelToken::new());
        assert!(matches!(result, Err(ControlError::UnverifiedSample { .. })));
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_corrupted_seed_frame_does_not_abort_run() {
        let joint = joint(PlantParams::default());
        let mut ctl = ssi_controller(&joint).with_gains(GENTLE);
        let mut reports = Vec::new();
        joint.corrupt_frames(1);

        let summary = ctl
            .run_pid_with(4000, 200, 10_000, &CancelToken::new(), |r| {
                reports.push(r.clone())
            })
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Deadline);
        assert_eq!(summary.cycles, 20);
        assert_eq!(summary.crc_mismatches, 0);
        assert!(reports[0].pid.is_some());
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_pid_starts_at_first_verified_cycle() {
        let joint = joint(PlantParams::default());
        let mut ctl = ssi_controller(&joint).with_gains(GENTLE);
        let mut reports = Vec::new();
        // seed plus the first two cycles
        joint.corrupt_frames(3);

        let summary = ctl
            .run_pid_with(4000, 200, 10_000, &CancelToken::new(), |r| {
                reports.push(r.clone())
            })
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Deadline);
        assert_eq!(summary.crc_mismatches, 2);
        assert!(reports[0].pid.is_none());
        assert!(reports[1].pid.is_none());
        assert_eq!(reports[0].command, 0);
        assert_eq!(reports[1].command, 0);

        let first = reports[2].pid.unwrap();
        // dt spans one interval from the discarded cycle
        assert!((first.dt - 0.01).abs() < 0.001, "dt {}", first.dt);
        assert!(!first.derivative_suppressed);
        assert!(reports[2].command != 0);
    }

    #[test]
    fn test_gains_and_display() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);
        ctl.set_gains(GENTLE);
        assert_eq!(ctl.gains(), GENTLE);

        let text = ctl.to_string();
        assert!(text.contains("4096 counts/rev"));
        assert!(text.contains("kp:0.5"));
        assert!(text.contains("polarity normal"));
    }

    #[test]
    fn test_drop_releases_motor() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);
        ctl.set_motor(700).unwrap();
        assert_eq!(joint.duties(), (700, 0));

        drop(ctl);
        assert_eq!(joint.duties(), (0, 0));
    }

    #[test]
    fn test_open_loop_probe_through_controller() {
        let joint = joint(PlantParams::default());
        let mut ctl = i2c_controller(&joint);
        let samples = ctl.open_loop_probe(-600, 50, 10).unwrap();
        assert_eq!(samples.len(), 5);
        assert!(angle_diff(samples[4].counts, samples[0].counts, 4096) < 0);
        assert_eq!(joint.duties(), (0, 0));
    }
}
