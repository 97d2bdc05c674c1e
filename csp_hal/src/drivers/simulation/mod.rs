//! Simulation master.
//!
//! A software bus with CiA-402 drives for development and testing
//! without physical hardware.

mod drive;
mod master;

pub use drive::{
    ABORT_NO_OBJECT, ABORT_VALUE_RANGE, ERROR_FOLLOWING, PowerState, SimDriveConfig,
    SimulatedDrive,
};
pub use master::SimulationMaster;

use std::time::Duration;

use csp_common::bus::FieldbusMaster;

/// Factory function for a single-drive simulation master.
pub fn create_master(cycle_time: Duration) -> Box<dyn FieldbusMaster> {
    Box::new(SimulationMaster::single_drive(
        cycle_time,
        SimDriveConfig::default(),
    ))
}
