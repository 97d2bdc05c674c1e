//! Setpoint production and tracking supervision.
//!
//! - [`generator`] - Back-and-forth CSP setpoint stream with ramp and dwell
//! - [`monitor`] - Hysteretic tracking-error warning

pub mod generator;
pub mod monitor;

pub use generator::{Direction, GeneratorTick, SetpointGenerator};
pub use monitor::{MonitorEvent, TrackingMonitor};
