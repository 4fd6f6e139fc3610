// Timing and cancellation primitives consumed by the control loop
//
// PWM, I2C, SPI, chip-select and delay come from embedded-hal. The only thing
// embedded-hal does not model is a free-running tick counter, so that lives here.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

/// Free-running tick counters. Both counters are allowed to wrap; compare
/// readings with [`ticks_diff`] only.
pub trait MonotonicClock {
    fn ticks_us(&self) -> u32;
    fn ticks_ms(&self) -> u32;
}

/// Signed difference `later - earlier` that stays correct across a counter wrap,
/// as long as the two readings are less than half the counter range apart.
pub fn ticks_diff(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

/// Clock backed by `std::time::Instant`, truncated to 32-bit tick counters
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for StdClock {
    fn ticks_us(&self) -> u32 {
        // truncation is the wrap
        self.origin.elapsed().as_micros() as u32
    }

    fn ticks_ms(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}

/// Blocking delay that parks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Shared stop flag checked once per control cycle.
///
/// Clones observe the same flag, so an emergency-stop handler on another task
/// can end a run without waiting out its full duration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm the token for the next run
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_diff_plain() {
        assert_eq!(ticks_diff(1_500, 1_000), 500);
        assert_eq!(ticks_diff(1_000, 1_500), -500);
        assert_eq!(ticks_diff(42, 42), 0);
    }

    #[test]
    fn test_ticks_diff_across_wrap() {
        // counter wrapped between the two readings
        let earlier = u32::MAX - 99;
        let later = 100;
        assert_eq!(ticks_diff(later, earlier), 200);
        assert_eq!(ticks_diff(earlier, later), -200);
    }

    #[test]
    fn test_std_clock_is_monotonic() {
        let clock = StdClock::new();
        let first = clock.ticks_us();
        StdDelay.delay_us(200);
        let second = clock.ticks_us();
        assert!(ticks_diff(second, first) >= 200);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!handle.is_cancelled());
    }
}
