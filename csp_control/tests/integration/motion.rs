//! Setpoint stream, new-setpoint edges and tracking warning against the
//! simulated drive.

use csp_common::config::{DriveConfig, EdgePolicy};
use csp_control::control::Direction;
use csp_hal::SimDriveConfig;
use csp_hal::drivers::simulation::PowerState;

use super::{MS, Rig, outputs, rig, run_until_running};

fn stepping(step: i32, limit: i32, dwell_ms: u32, policy: EdgePolicy) -> DriveConfig {
    let mut config = DriveConfig::default();
    config.motion.step_counts = step;
    config.motion.limit_counts = limit;
    config.motion.dwell_ms = dwell_ms;
    config.motion.ramp_ms = 0;
    config.motion.edge_policy = policy;
    config
}

/// Targets written by the next `n` cycles.
fn collect_targets(r: &mut Rig, n: usize) -> Vec<i32> {
    (0..n)
        .map(|_| {
            r.step(MS).unwrap();
            outputs(r).target_position
        })
        .collect()
}

#[test]
fn limit_dwell_and_reversal() {
    let config = stepping(100, 950, 5, EdgePolicy::ToggleOnChange);
    let mut r = rig(config, SimDriveConfig::default());
    run_until_running(&mut r, 20);

    let targets = collect_targets(&mut r, 45);
    assert!(targets.iter().all(|t| t.abs() <= 950));

    // Upper limit: clamp tick plus five dwell ticks, then back down.
    assert_eq!(&targets[..9], &[100, 200, 300, 400, 500, 600, 700, 800, 900]);
    assert!(targets[9..15].iter().all(|&t| t == 950));
    assert_eq!(targets[15], 850);

    // -950 is reached exactly, the next tick clamps and starts the dwell.
    assert!(targets[33..40].iter().all(|&t| t == -950));
    assert_eq!(targets[40], -850);
    assert_eq!(r.axis().diagnostics().direction, Direction::Forward);

    let drive = r.master().drive(0).unwrap();
    assert_eq!(drive.state(), PowerState::OperationEnabled);
    assert!(drive.actual_position().abs() <= 950);
}

#[test]
fn every_tick_policy_toggles_each_cycle() {
    let config = stepping(100, 950, 5, EdgePolicy::ToggleEveryTick);
    let mut r = rig(config, SimDriveConfig::default());
    run_until_running(&mut r, 20);

    collect_targets(&mut r, 50);
    // The last word is still sitting in the image.
    assert_eq!(r.master().drive(0).unwrap().setpoint_edges(), 49);
}

#[test]
fn on_change_policy_skips_held_targets() {
    let config = stepping(100, 950, 5, EdgePolicy::ToggleOnChange);
    let mut r = rig(config, SimDriveConfig::default());
    run_until_running(&mut r, 20);
    let start = outputs(&mut r).target_position;

    let targets = collect_targets(&mut r, 50);
    let mut prev = start;
    let mut changes = 0;
    for &t in &targets[..49] {
        if t != prev {
            changes += 1;
        }
        prev = t;
    }

    let edges = r.master().drive(0).unwrap().setpoint_edges();
    assert_eq!(edges, changes);
    assert!(edges < 49, "dwell ticks must not toggle");
}

#[test]
fn tracking_warning_latches_in_motion_and_clears_in_dwell() {
    let mut config = stepping(300, 30_000, 500, EdgePolicy::ToggleOnChange);
    config.monitor.tracking_window_counts = 2000;
    config.monitor.warn_percent = 80;
    // Keep the drive from tripping on the small window.
    config.sdo.write_tracking_window = false;
    let sim = SimDriveConfig {
        follow_gain_percent: 5,
        ..Default::default()
    };
    let mut r = rig(config, sim);
    run_until_running(&mut r, 20);

    let mut latched_at = None;
    let mut cleared_at = None;
    for n in 0..400u32 {
        r.step(MS).unwrap();
        let d = r.axis().diagnostics();
        match (latched_at, cleared_at) {
            (None, _) if d.tracking_warning => {
                assert_ne!(d.direction, Direction::Paused);
                latched_at = Some(n);
            }
            (Some(_), None) if !d.tracking_warning => {
                assert_eq!(d.direction, Direction::Paused);
                cleared_at = Some(n);
            }
            _ => {}
        }
    }

    let latched_at = latched_at.expect("warning never latched");
    let cleared_at = cleared_at.expect("warning never cleared");
    assert!(latched_at < cleared_at);
    assert_eq!(
        r.master().drive(0).unwrap().state(),
        PowerState::OperationEnabled
    );
}
