//! Fault reset pulsing, fault cooldown and link loss.

use csp_common::config::DriveConfig;
use csp_control::state::EnableState;
use csp_hal::SimDriveConfig;
use csp_hal::drivers::simulation::PowerState;

use super::{MS, outputs, rig, run_until_running};

const FAULT: u16 = 0x7500;

#[test]
fn persistent_fault_alternates_reset_and_shutdown() {
    let mut r = rig(DriveConfig::default(), SimDriveConfig::default());
    run_until_running(&mut r, 20);
    for _ in 0..10 {
        r.step(MS).unwrap();
    }

    {
        let drive = r.master_mut().drive_mut(0).unwrap();
        drive.set_reset_inhibit(true);
        drive.inject_fault(FAULT);
    }

    let words: Vec<u16> = (0..8)
        .map(|_| {
            r.step(MS).unwrap();
            outputs(&mut r).control_word
        })
        .collect();
    assert_eq!(
        words,
        vec![0x0080, 0x0006, 0x0080, 0x0006, 0x0080, 0x0006, 0x0080, 0x0006]
    );
    let d = r.axis().diagnostics();
    assert!(d.fault_active);
    assert_eq!(d.last_error_code, FAULT);
}

#[test]
fn fault_recovery_holds_cooldown_then_re_enables() {
    let mut config = DriveConfig::default();
    config.recovery.fault_cooldown_ms = 50;
    let mut r = rig(config, SimDriveConfig::default());
    run_until_running(&mut r, 20);
    for _ in 0..100 {
        r.step(MS).unwrap();
    }

    r.master_mut().inject_fault(0, FAULT).unwrap();
    r.step(MS).unwrap();
    assert_eq!(outputs(&mut r).control_word, 0x0080);
    assert!(r.axis().diagnostics().fault_active);
    assert_eq!(r.axis().enable_state(), EnableState::Idle);

    // The reset edge clears the simulated fault on the next exchange.
    r.step(MS).unwrap();
    assert!(!r.axis().diagnostics().fault_active);

    // Cooldown: shutdown held while the drive settles in ready-to-switch-on.
    for _ in 0..49 {
        r.step(MS).unwrap();
        assert_eq!(outputs(&mut r).control_word, 0x0006);
        assert_eq!(r.axis().enable_state(), EnableState::Idle);
    }
    assert_eq!(
        r.master().drive(0).unwrap().state(),
        PowerState::ReadyToSwitchOn
    );

    // Full sequence again, not a jump back into motion.
    let mut words = Vec::new();
    let mut states = Vec::new();
    for _ in 0..5 {
        r.step(MS).unwrap();
        words.push(outputs(&mut r).control_word);
        states.push(r.axis().enable_state());
    }
    assert_eq!(words, vec![0x0006, 0x0007, 0x0007, 0x000F, 0x000F]);
    assert_eq!(
        states,
        vec![
            EnableState::RequestingSwitchOn,
            EnableState::RequestingSwitchOn,
            EnableState::Aligning,
            EnableState::Aligning,
            EnableState::Running,
        ]
    );

    let actual = r.master().drive(0).unwrap().actual_position();
    let latched = outputs(&mut r).target_position;
    assert_eq!(latched, actual);

    // Ramp re-armed: the first tick moves one count.
    r.step(MS).unwrap();
    let first = outputs(&mut r);
    assert_eq!(first.control_word, 0x001F);
    assert_eq!(first.target_position, latched + 1);
    assert_eq!(r.axis().diagnostics().last_error_code, 0);
}

#[test]
fn re_enable_is_bumpless_after_fault() {
    let mut config = DriveConfig::default();
    config.recovery.fault_cooldown_ms = 5;
    let mut r = rig(config, SimDriveConfig::default());
    run_until_running(&mut r, 20);
    for _ in 0..400 {
        r.step(MS).unwrap();
    }
    r.master_mut().inject_fault(0, FAULT).unwrap();
    r.step(MS).unwrap();
    assert_eq!(r.axis().enable_state(), EnableState::Idle);
    run_until_running(&mut r, 20);

    let actual = r.master().drive(0).unwrap().actual_position();
    assert_eq!(outputs(&mut r).target_position, actual);
}

#[test]
fn re_enable_raises_edge_on_first_new_setpoint() {
    let mut config = DriveConfig::default();
    config.recovery.fault_cooldown_ms = 5;
    let mut r = rig(config, SimDriveConfig::default());
    run_until_running(&mut r, 20);
    for _ in 0..100 {
        r.step(MS).unwrap();
    }
    // Leave the edge bit set before the fault.
    while !r.axis().diagnostics().edge {
        r.step(MS).unwrap();
    }

    r.master_mut().inject_fault(0, FAULT).unwrap();
    r.step(MS).unwrap();
    run_until_running(&mut r, 20);
    assert!(!r.axis().diagnostics().edge);

    let edges_before = r.master().drive(0).unwrap().setpoint_edges();
    let mut prev = outputs(&mut r).target_position;
    let mut changes = 0;
    for n in 0..30 {
        r.step(MS).unwrap();
        let target = outputs(&mut r).target_position;
        // The last word has not been exchanged yet.
        if n < 29 && target != prev {
            changes += 1;
        }
        prev = target;
    }

    let edges = r.master().drive(0).unwrap().setpoint_edges() - edges_before;
    assert_eq!(changes, 29);
    assert_eq!(edges, changes);
}

#[test]
fn link_loss_freezes_outputs_and_resumes() {
    let mut r = rig(DriveConfig::default(), SimDriveConfig::default());
    run_until_running(&mut r, 20);
    for _ in 0..50 {
        r.step(MS).unwrap();
    }

    r.master_mut().set_link(0, false).unwrap();
    r.step(MS).unwrap();
    let frozen = outputs(&mut r);
    for _ in 0..30 {
        r.step(MS).unwrap();
        assert_eq!(outputs(&mut r), frozen);
    }
    assert_eq!(r.axis().enable_state(), EnableState::Running);

    r.master_mut().set_link(0, true).unwrap();
    let step = r.axis().config().motion.step_counts;
    let mut prev = frozen.target_position;
    for _ in 0..10 {
        r.step(MS).unwrap();
        let target = outputs(&mut r).target_position;
        // One tick per period after the link returns, no catch-up burst.
        assert!((target - prev).abs() <= step);
        prev = target;
    }
    assert_ne!(prev, frozen.target_position);
}

#[test]
fn link_loss_before_enable_suspends_sequence() {
    let mut r = rig(DriveConfig::default(), SimDriveConfig::default());
    r.step(MS).unwrap();
    r.step(MS).unwrap();
    assert_eq!(r.axis().enable_state(), EnableState::RequestingSwitchOn);

    r.master_mut().set_link(0, false).unwrap();
    for _ in 0..5 {
        r.step(MS).unwrap();
    }
    assert_eq!(r.axis().enable_state(), EnableState::RequestingSwitchOn);

    r.master_mut().set_link(0, true).unwrap();
    run_until_running(&mut r, 20);
}
