//! Field-bus master implementations.
//!
//! - [`simulation`] - Software bus with simulated CiA-402 drives
//!
//! # Adding New Masters
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `FieldbusMaster` trait from `csp_common::bus`
//! 3. Export a `create_master()` factory and register it in [`master_names`]

pub mod simulation;

use std::time::Duration;

use csp_common::bus::{BusError, FieldbusMaster};

/// Names accepted by [`create_master`].
pub fn master_names() -> &'static [&'static str] {
    &["simulation"]
}

/// Create a master by name.
///
/// # Errors
/// `BusError::Transport` if no master with that name is built in.
pub fn create_master(name: &str, cycle_time: Duration) -> Result<Box<dyn FieldbusMaster>, BusError> {
    match name {
        "simulation" => Ok(simulation::create_master(cycle_time)),
        other => Err(BusError::Transport(format!("unknown master '{other}'"))),
    }
}
