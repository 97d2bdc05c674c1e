//! Axis state machines.
//!
//! - [`enable`] - CiA-402 enable sequence (Idle → Running)
//! - [`supervisor`] - Link, fault and cooldown gating ahead of the sequence

pub mod enable;
pub mod supervisor;

pub use enable::{EnableState, EnableStep};
pub use supervisor::{Gate, Supervisor};
