//! Closed-loop position control for a single robotic-arm joint.
//!
//! Reads an absolute magnetic encoder (AS5600 over I2C, MT6701 over SSI or I2C),
//! runs a PID toward a target angle and drives a dual-PWM H-bridge. Hardware is
//! reached only through `embedded-hal` traits plus [`hal::MonotonicClock`], so the
//! same controller runs on a board or against [`sim::SimJoint`].
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`angle`] | Wrap-aware count arithmetic |
//! | [`encoder`] | Sensor drivers and the SSI frame / CRC-6 decoder |
//! | [`motor`] | Drive stage, direction probe, bring-up routines |
//! | [`pid`] | PID update with anti-windup and dt guard |
//! | [`runtime`] | [`runtime::MotorController`] and the fixed-rate loop |
//! | [`messages`] | Per-cycle reports and run summaries |
//! | [`sim`] | Deterministic simulated joint |

pub mod angle;
pub mod config;
pub mod encoder;
pub mod error;
pub mod hal;
pub mod messages;
pub mod motor;
pub mod pid;
pub mod runtime;
pub mod sim;

pub use error::ControlError;
pub use runtime::MotorController;
