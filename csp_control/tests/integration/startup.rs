//! Enable sequence against the simulated drive.

use std::io::Write;

use csp_common::config::{DriveConfig, EdgePolicy};
use tempfile::NamedTempFile;
use csp_control::control::Direction;
use csp_control::state::EnableState;
use csp_hal::{SimDriveConfig, drivers::simulation::PowerState};

use super::{MS, outputs, rig, run_until_running};

#[test]
fn enable_sequence_command_words() {
    let mut r = rig(DriveConfig::default(), SimDriveConfig::default());
    let mut words = Vec::new();
    let mut states = Vec::new();
    for _ in 0..7 {
        r.step(MS).unwrap();
        words.push(outputs(&mut r).control_word);
        states.push(r.axis().enable_state());
    }
    assert_eq!(
        words,
        vec![0x0006, 0x0006, 0x0007, 0x0007, 0x000F, 0x000F, 0x001F]
    );
    assert_eq!(
        states,
        vec![
            EnableState::Idle,
            EnableState::RequestingSwitchOn,
            EnableState::RequestingSwitchOn,
            EnableState::Aligning,
            EnableState::Aligning,
            EnableState::Running,
            EnableState::Running,
        ]
    );
    assert_eq!(
        r.master().drive(0).unwrap().state(),
        PowerState::OperationEnabled
    );
}

#[test]
fn target_latched_from_actual_position() {
    let sim = SimDriveConfig {
        initial_position: -54_321,
        ..Default::default()
    };
    let mut r = rig(DriveConfig::default(), sim);
    run_until_running(&mut r, 20);
    assert_eq!(outputs(&mut r).target_position, -54_321);

    // First ramp tick moves by a single count.
    r.step(MS).unwrap();
    assert_eq!(outputs(&mut r).target_position, -54_320);
    assert_eq!(r.axis().diagnostics().direction, Direction::Forward);
}

#[test]
fn startup_sdo_program_reaches_drive() {
    let r = rig(DriveConfig::default(), SimDriveConfig::default());
    let drive = r.master().drive(0).unwrap();
    assert_eq!(drive.object(0x6060, 0), Some(8));
    assert_eq!(drive.object(0x60C2, 1), Some(1000));
    assert_eq!(drive.object(0x6065, 0), Some(20_000));
    assert_eq!(drive.object(0x10F1, 1), None);
}

#[test]
fn comm_cooldown_delays_enable() {
    let mut config = DriveConfig::default();
    config.recovery.comm_cooldown_ms = 20;
    let mut r = rig(config, SimDriveConfig::default());
    for _ in 0..20 {
        r.step(MS).unwrap();
        assert_eq!(outputs(&mut r).control_word, 0x0006);
        assert_eq!(r.axis().enable_state(), EnableState::Idle);
    }
    let cycles = run_until_running(&mut r, 20);
    assert!(cycles >= 5, "enabled after {cycles} cycles");
}

#[test]
fn slower_period_still_enables() {
    let mut config = DriveConfig::default();
    config.motion.cycle_period_ms = 4;
    let mut r = rig(config, SimDriveConfig::default());
    run_until_running(&mut r, 20);
    let start = outputs(&mut r).target_position;

    // Generator waits a full 4 ms period before its first tick.
    for _ in 0..3 {
        r.step(MS).unwrap();
        assert_eq!(outputs(&mut r).target_position, start);
    }
    r.step(MS).unwrap();
    assert_ne!(outputs(&mut r).target_position, start);
}

#[test]
fn config_file_shapes_the_setpoint_stream() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "[motion]\nstep_counts = 250\nlimit_counts = 500\ndwell_ms = 2\nramp_ms = 0\nedge_policy = \"toggle_every_tick\"\n\n[sdo]\nwrite_sync_watchdog = true\nsync_watchdog_value = 3\n"
    )
    .unwrap();
    file.flush().unwrap();

    let config = DriveConfig::load_validated(file.path()).unwrap();
    assert_eq!(config.motion.edge_policy, EdgePolicy::ToggleEveryTick);
    let mut r = rig(config, SimDriveConfig::default());
    assert_eq!(r.master().drive(0).unwrap().object(0x10F1, 1), Some(3));

    run_until_running(&mut r, 20);
    let targets: Vec<i32> = (0..6)
        .map(|_| {
            r.step(MS).unwrap();
            outputs(&mut r).target_position
        })
        .collect();
    assert_eq!(targets, vec![250, 500, 500, 500, 500, 250]);
}

#[test]
fn start_outside_limit_latches_clamped_target() {
    let mut config = DriveConfig::default();
    config.motion.step_counts = 100;
    config.motion.limit_counts = 1000;
    // The first move to the limit would trip the drive's window.
    config.sdo.write_tracking_window = false;
    let sim = SimDriveConfig {
        initial_position: 50_000,
        ..Default::default()
    };
    let mut r = rig(config, sim);

    for _ in 0..100 {
        r.step(MS).unwrap();
        assert!(outputs(&mut r).target_position.abs() <= 1000);
    }
    assert_eq!(r.axis().enable_state(), EnableState::Running);
    assert_eq!(r.master().drive(0).unwrap().actual_position(), 1000);
}
