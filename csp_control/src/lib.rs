//! # CSP Control Library
//!
//! Cyclic core for one CiA-402 servo drive in Cyclic Synchronous Position
//! mode. Each call reads the drive's status, decides whether the drive may
//! be commanded at all, walks it through the enable sequence and, once
//! operation is enabled, streams a ramped back-and-forth position setpoint.
//!
//! ## Layers
//!
//! 1. **Supervisor** ([`state::supervisor`]) - link loss, fault reset
//!    pulsing, recovery cooldowns
//! 2. **Enable sequence** ([`state::enable`]) - shutdown → switch on →
//!    enable operation, with bumpless target latch
//! 3. **Generator** ([`control::generator`]) - ramp, limit dwell, reversal,
//!    new-setpoint edge
//! 4. **Monitor** ([`control::monitor`]) - tracking-error warning with
//!    hysteresis
//!
//! [`axis::CspAxis`] ties the layers to the process image;
//! [`cycle::CycleRunner`] paces it against a field-bus master.
//!
//! ## No Hidden State
//!
//! All state lives in the caller-owned [`axis::CspAxis`]. The core never
//! reads a clock; time arrives as the `elapsed` argument.

pub mod axis;
pub mod control;
pub mod cycle;
pub mod state;
pub mod timing;

pub use axis::{AxisDiagnostics, CspAxis, InitStatus};
