//! Shared rig for the integration tests.

mod motion;
mod recovery;
mod startup;

use std::time::Duration;

use csp_common::config::DriveConfig;
use csp_common::image::DriveOutputs;
use csp_control::cycle::CycleRunner;
use csp_control::state::EnableState;
use csp_control::{CspAxis, InitStatus};
use csp_hal::{SimDriveConfig, SimulationMaster};

pub const MS: Duration = Duration::from_millis(1);

pub type Rig = CycleRunner<SimulationMaster>;

/// Single simulated drive bound to a fresh axis.
pub fn rig(config: DriveConfig, sim: SimDriveConfig) -> Rig {
    let period = Duration::from_millis(config.motion.cycle_period_ms as u64);
    let mut master = SimulationMaster::single_drive(period, sim);
    let slave = master.slaves()[0];
    let layout = master.pdo_layout(0).unwrap();
    let mut axis = CspAxis::new(config);
    assert_eq!(axis.init(&mut master, &slave, &layout), InitStatus::Ready);
    CycleRunner::new(master, axis)
}

/// Outputs the axis left in the image after the last step.
pub fn outputs(rig: &mut Rig) -> DriveOutputs {
    use csp_common::bus::FieldbusMaster;
    DriveOutputs::decode(&rig.master_mut().process_image_mut().outputs).unwrap()
}

/// Step until the axis reports `Running`; returns the cycles taken.
pub fn run_until_running(rig: &mut Rig, max_cycles: u32) -> u32 {
    for n in 1..=max_cycles {
        rig.step(MS).unwrap();
        if rig.axis().enable_state() == EnableState::Running {
            return n;
        }
    }
    panic!("axis not running after {max_cycles} cycles");
}
