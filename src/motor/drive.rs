// Dual-PWM H-bridge drive stage
//
// A signed power command becomes two complementary duties: forward XOR reverse
// XOR neither. Polarity can be swapped logically after direction calibration;
// the physical channels are never re-created.

use embedded_hal::pwm::{Error as _, SetDutyCycle};
use serde::Serialize;
use tracing::{debug, info};

/// Full-scale logical duty (10-bit). Channels with a different native range are rescaled.
pub const MAX_DUTY: i32 = 1023;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("PWM channel fault: {0:?}")]
    Pwm(embedded_hal::pwm::ErrorKind),
}

/// Logical duties on the 0..=MAX_DUTY scale. At most one is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DutyPair {
    pub forward: u16,
    pub reverse: u16,
}

impl DutyPair {
    pub fn from_power(power: i32) -> Self {
        let power = clamp_power(power);
        if power > 0 {
            Self {
                forward: power as u16,
                reverse: 0,
            }
        } else if power < 0 {
            Self {
                forward: 0,
                reverse: power.unsigned_abs() as u16,
            }
        } else {
            Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.forward == 0 && self.reverse == 0
    }
}

pub fn clamp_power(power: i32) -> i32 {
    power.clamp(-MAX_DUTY, MAX_DUTY)
}

/// Owns the two PWM channels of one joint
pub struct DriveStage<A, B> {
    /// Physical channel wired as "forward" at boot
    channel_a: A,
    /// Physical channel wired as "reverse" at boot
    channel_b: B,
    swapped: bool,
    last: DutyPair,
}

impl<A, B> DriveStage<A, B>
where
    A: SetDutyCycle,
    B: SetDutyCycle,
{
    /// Take the channels and force both off
    pub fn new(channel_a: A, channel_b: B) -> Result<Self, DriveError> {
        let mut stage = Self {
            channel_a,
            channel_b,
            swapped: false,
            last: DutyPair::default(),
        };
        stage.stop()?;
        Ok(stage)
    }

    /// Apply a signed power command. Returns the logical duties actually applied.
    pub fn set_power(&mut self, power: i32) -> Result<DutyPair, DriveError> {
        let duty = DutyPair::from_power(power);
        let (a, b) = if self.swapped {
            (duty.reverse, duty.forward)
        } else {
            (duty.forward, duty.reverse)
        };

        // Release the idle side before energizing the other one
        if a == 0 {
            write_duty(&mut self.channel_a, 0)?;
            write_duty(&mut self.channel_b, b)?;
        } else {
            write_duty(&mut self.channel_b, 0)?;
            write_duty(&mut self.channel_a, a)?;
        }

        if duty != self.last {
            debug!(
                "Drive duty fwd={} rev={} (swapped={})",
                duty.forward, duty.reverse, self.swapped
            );
        }
        self.last = duty;
        Ok(duty)
    }

    pub fn stop(&mut self) -> Result<(), DriveError> {
        self.set_power(0).map(|_| ())
    }

    /// Exchange which physical channel is logically "forward"
    pub fn swap_polarity(&mut self) -> Result<(), DriveError> {
        self.stop()?;
        self.swapped = !self.swapped;
        info!("Drive polarity swapped (swapped={})", self.swapped);
        Ok(())
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    pub fn last_duty(&self) -> DutyPair {
        self.last
    }

    /// Give back the channels (left de-energized)
    pub fn release(mut self) -> Result<(A, B), DriveError> {
        self.stop()?;
        Ok((self.channel_a, self.channel_b))
    }
}

fn write_duty<P: SetDutyCycle>(channel: &mut P, duty: u16) -> Result<(), DriveError> {
    let result = if duty == 0 {
        channel.set_duty_cycle_fully_off()
    } else {
        channel.set_duty_cycle_fraction(duty, MAX_DUTY as u16)
    };
    result.map_err(|e| DriveError::Pwm(e.kind()))
}
