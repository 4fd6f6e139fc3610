//! Position PID over a wrap-around angle space.
//!
//! The loop measures `dt` every cycle instead of assuming the nominal interval,
//! and drops the derivative term when `dt` is too short to differentiate over.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::angle::angle_diff;
use crate::config::{DEFAULT_GAINS, DEFAULT_LIMITS};
use crate::hal::ticks_diff;

/// Controller gains, in duty units per encoder count (and per second)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        DEFAULT_GAINS
    }
}

impl fmt::Display for PidGains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kp:{} , ki:{} , kd:{}", self.kp, self.ki, self.kd)
    }
}

/// Saturation limits. Hitting either clamp is reported, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidLimits {
    pub max_i_term: f32,
    pub max_output: f32,
    /// Fraction of the nominal interval below which `dt` is treated as degenerate
    pub derivative_min_dt_fraction: f32,
}

impl Default for PidLimits {
    fn default() -> Self {
        DEFAULT_LIMITS
    }
}

/// Per-run state. Created at run start, never carried across runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidState {
    pub integral: f32,
    pub last_error: f32,
    pub last_pos: u16,
    pub last_time_us: u32,
}

impl PidState {
    pub fn new(pos: u16, now_us: u32) -> Self {
        Self {
            integral: 0.0,
            last_error: 0.0,
            last_pos: pos,
            last_time_us: now_us,
        }
    }
}

/// Everything computed in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidStep {
    /// Seconds since the previous cycle
    pub dt: f32,
    pub error: i32,
    /// Counts moved since the previous cycle (diagnostic only)
    pub velocity: i32,
    pub pterm: f32,
    pub dterm: f32,
    pub iterm: f32,
    pub output: f32,
    pub i_saturated: bool,
    pub output_saturated: bool,
    pub derivative_suppressed: bool,
}

pub struct Pid {
    gains: PidGains,
    limits: PidLimits,
    interval_us: u32,
    modulus: u16,
    state: PidState,
}

impl Pid {
    /// `first_pos` and `now_us` seed the velocity and `dt` of the first cycle
    pub fn new(
        gains: PidGains,
        limits: PidLimits,
        interval_us: u32,
        modulus: u16,
        first_pos: u16,
        now_us: u32,
    ) -> Self {
        Self {
            gains,
            limits,
            interval_us,
            modulus,
            state: PidState::new(first_pos, now_us),
        }
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    pub fn update(&mut self, target: u16, pos: u16, now_us: u32) -> PidStep {
        let PidGains { kp, ki, kd } = self.gains;
        let state = &mut self.state;

        let dt = ticks_diff(now_us, state.last_time_us) as f32 / 1e6;
        let error = angle_diff(target, pos, self.modulus);
        let velocity = angle_diff(pos, state.last_pos, self.modulus);
        let err = error as f32;

        state.integral += err * dt;

        let pterm = kp * err;

        let min_dt = self.limits.derivative_min_dt_fraction * (self.interval_us as f32 / 1e6);
        let derivative_suppressed = dt <= min_dt;
        let dterm = if derivative_suppressed {
            0.0
        } else {
            kd * ((err - state.last_error) / dt)
        };

        let (iterm, i_saturated) = saturate(ki * state.integral, self.limits.max_i_term);
        let (output, output_saturated) = saturate(pterm + dterm + iterm, self.limits.max_output);

        state.last_time_us = now_us;
        state.last_pos = pos;
        state.last_error = err;

        PidStep {
            dt,
            error,
            velocity,
            pterm,
            dterm,
            iterm,
            output,
            i_saturated,
            output_saturated,
            derivative_suppressed,
        }
    }
}

fn saturate(value: f32, limit: f32) -> (f32, bool) {
    if value.abs() > limit {
        (limit.copysign(value), true)
    } else {
        (value, false)
    }
}
