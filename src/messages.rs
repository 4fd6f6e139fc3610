// Diagnostic records produced by the control loop

use serde::Serialize;

use crate::encoder::AngularSample;
use crate::pid::{PidGains, PidStep};

/// Lifecycle of a controller. `Stopped` is re-entered by starting a new run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Running,
    Stopped,
}

/// Why a run ended without an error
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Full duration elapsed
    Deadline,
    /// Cancel token tripped (emergency stop)
    Cancelled,
}

// One record per cycle; `pid` is None when the sample failed its CRC and was discarded
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u32,
    pub t_us: u32,
    pub sample: AngularSample,
    pub pid: Option<PidStep>,
    /// Power actually sent to the drive stage
    pub command: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub target: u16,
    pub gains: PidGains,
    pub cycles: u32,
    pub stop_reason: StopReason,
    pub final_position: Option<u16>,
    pub final_error: Option<i32>,
    pub i_saturations: u32,
    pub output_saturations: u32,
    pub derivative_suppressions: u32,
    pub crc_mismatches: u32,
}

impl RunSummary {
    pub fn new(target: u16, gains: PidGains) -> Self {
        Self {
            target,
            gains,
            cycles: 0,
            stop_reason: StopReason::Deadline,
            final_position: None,
            final_error: None,
            i_saturations: 0,
            output_saturations: 0,
            derivative_suppressions: 0,
            crc_mismatches: 0,
        }
    }

    /// Fold one completed cycle into the totals
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        match report.pid {
            Some(step) => {
                self.final_position = Some(report.sample.counts);
                self.final_error = Some(step.error);
                self.i_saturations += u32::from(step.i_saturated);
                self.output_saturations += u32::from(step.output_saturated);
                self.derivative_suppressions += u32::from(step.derivative_suppressed);
            }
            None => self.crc_mismatches += 1,
        }
    }
}
