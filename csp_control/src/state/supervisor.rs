//! Link, fault and cooldown supervision.
//!
//! Evaluated first on every cycle. Checks run in a fixed order and the
//! first one that applies decides the cycle:
//!
//! 1. Status word zero (link down) → re-mark the pacer, touch nothing.
//! 2. Fault bit → alternate fault reset (0x0080) and shutdown (0x0006).
//! 3. Fault cooldown after a fault cleared → hold shutdown.
//!
//! Both fault steps also send the enable sequence back to `Idle`, so a
//! recovered drive is always walked through the full sequence again.
//!
//! 4. Startup comm cooldown → hold shutdown.
//! 5. Switch-on-disabled → force the enable sequence to `Idle`.
//!
//! Otherwise the enable sequence may proceed.

use csp_common::cia402::{ControlWord, StatusWord};
use csp_common::config::RecoveryConfig;
use tracing::{debug, info, warn};

use crate::timing::Pacer;

/// Supervisor verdict for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Normal processing.
    Proceed,
    /// Leave the outputs untouched.
    Suspend,
    /// Write this control word and stop.
    Hold(ControlWord),
    /// Reset the enable sequence to `Idle`, write this control word and stop.
    Recover(ControlWord),
    /// Reset the enable sequence to `Idle` and write shutdown.
    Disable,
}

/// Supervisor state.
#[derive(Debug, Clone)]
pub struct Supervisor {
    /// Next fault cycle sends the shutdown release.
    pulse_pending: bool,
    /// A fault was observed and has not yet cleared.
    fault_seen: bool,
    /// Error code reported with the current fault.
    fault_code: u16,
    fault_cooldown_ms: u32,
    /// Remaining fault cooldown [ms].
    fault_cool_rem: u32,
    /// Remaining startup comm cooldown [ms].
    comm_cool_rem: u32,
    link_down: bool,
}

impl Supervisor {
    pub fn new(recovery: &RecoveryConfig) -> Self {
        Self {
            pulse_pending: false,
            fault_seen: false,
            fault_code: 0,
            fault_cooldown_ms: recovery.fault_cooldown_ms,
            fault_cool_rem: 0,
            comm_cool_rem: recovery.comm_cooldown_ms,
            link_down: false,
        }
    }

    #[inline]
    pub fn fault_active(&self) -> bool {
        self.fault_seen
    }

    /// Error code of the last observed fault (0 if none since reset).
    #[inline]
    pub fn fault_code(&self) -> u16 {
        self.fault_code
    }

    #[inline]
    pub fn fault_cooldown_remaining(&self) -> u32 {
        self.fault_cool_rem
    }

    #[inline]
    pub fn comm_cooldown_remaining(&self) -> u32 {
        self.comm_cool_rem
    }

    /// Decide the cycle. `pacer` must already include this cycle's elapsed time.
    pub fn evaluate(&mut self, status: StatusWord, error_code: u16, pacer: &mut Pacer) -> Gate {
        if status.is_link_down() {
            if !self.link_down {
                warn!("Drive status reads zero, suspending outputs");
                self.link_down = true;
            }
            pacer.mark();
            return Gate::Suspend;
        }
        if self.link_down {
            info!("Drive status restored ({:#06x})", status.bits());
            self.link_down = false;
        }

        if status.has_fault() {
            if !self.fault_seen || error_code != self.fault_code {
                warn!(
                    "Drive fault, error code {:#06x} (status={:#06x})",
                    error_code,
                    status.bits()
                );
            }
            self.fault_seen = true;
            self.fault_code = error_code;

            let cw = if self.pulse_pending {
                ControlWord::CMD_SHUTDOWN
            } else {
                ControlWord::CMD_FAULT_RESET
            };
            self.pulse_pending = !self.pulse_pending;
            return Gate::Recover(cw);
        }

        if self.fault_seen {
            info!(
                "Drive fault {:#06x} cleared, holding shutdown for {} ms",
                self.fault_code, self.fault_cooldown_ms
            );
            self.fault_seen = false;
            self.pulse_pending = false;
            self.fault_cool_rem = self.fault_cooldown_ms;
        }

        if self.fault_cool_rem > 0 {
            pacer.tick_down_ms(&mut self.fault_cool_rem);
            if self.fault_cool_rem == 0 {
                debug!("Fault cooldown elapsed");
            }
            return Gate::Recover(ControlWord::CMD_SHUTDOWN);
        }

        if self.comm_cool_rem > 0 {
            pacer.tick_down_ms(&mut self.comm_cool_rem);
            if self.comm_cool_rem == 0 {
                debug!("Comm cooldown elapsed");
            }
            return Gate::Hold(ControlWord::CMD_SHUTDOWN);
        }

        if status.switch_on_disabled() {
            return Gate::Disable;
        }

        Gate::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MS: Duration = Duration::from_millis(1);

    fn recovery(fault: u32, comm: u32) -> RecoveryConfig {
        RecoveryConfig {
            fault_cooldown_ms: fault,
            comm_cooldown_ms: comm,
        }
    }

    fn eval(s: &mut Supervisor, p: &mut Pacer, raw: u16) -> Gate {
        p.advance(MS);
        s.evaluate(StatusWord::from_raw(raw), 0, p)
    }

    #[test]
    fn link_down_suspends_and_marks() {
        let mut s = Supervisor::new(&recovery(0, 0));
        let mut p = Pacer::new();
        p.advance(Duration::from_millis(30));
        assert_eq!(s.evaluate(StatusWord::from_raw(0), 0, &mut p), Gate::Suspend);
        assert_eq!(p.since_mark(), Duration::ZERO);
    }

    #[test]
    fn fault_alternates_reset_and_release() {
        let mut s = Supervisor::new(&recovery(0, 0));
        let mut p = Pacer::new();
        let expected = [0x0080, 0x0006, 0x0080, 0x0006, 0x0080];
        for want in expected {
            assert_eq!(
                eval(&mut s, &mut p, 0x0208),
                Gate::Recover(ControlWord::from_raw(want))
            );
        }
        assert!(s.fault_active());
    }

    #[test]
    fn fault_cooldown_holds_for_configured_ms() {
        let mut s = Supervisor::new(&recovery(3, 0));
        let mut p = Pacer::new();
        eval(&mut s, &mut p, 0x0208);
        // Cleared: 3 ms of shutdown hold, then switch-on-disabled handling.
        for _ in 0..3 {
            assert_eq!(
                eval(&mut s, &mut p, 0x0240),
                Gate::Recover(ControlWord::CMD_SHUTDOWN)
            );
        }
        assert_eq!(eval(&mut s, &mut p, 0x0240), Gate::Disable);
        assert!(!s.fault_active());
    }

    #[test]
    fn cooldown_waits_for_elapsed_time() {
        let mut s = Supervisor::new(&recovery(2, 0));
        let mut p = Pacer::new();
        eval(&mut s, &mut p, 0x0208);
        p.mark();
        // No time passes: cooldown does not move.
        for _ in 0..5 {
            assert_eq!(
                s.evaluate(StatusWord::from_raw(0x0240), 0, &mut p),
                Gate::Recover(ControlWord::CMD_SHUTDOWN)
            );
        }
        assert_eq!(s.fault_cooldown_remaining(), 2);
    }

    #[test]
    fn fault_pulse_restarts_with_reset() {
        let mut s = Supervisor::new(&recovery(0, 0));
        let mut p = Pacer::new();
        eval(&mut s, &mut p, 0x0208);
        eval(&mut s, &mut p, 0x0240);
        // A new fault starts again with the reset pulse.
        assert_eq!(
            eval(&mut s, &mut p, 0x0208),
            Gate::Recover(ControlWord::CMD_FAULT_RESET)
        );
    }

    #[test]
    fn comm_cooldown_applies_once_at_startup() {
        let mut s = Supervisor::new(&recovery(0, 2));
        let mut p = Pacer::new();
        assert_eq!(
            eval(&mut s, &mut p, 0x0221),
            Gate::Hold(ControlWord::CMD_SHUTDOWN)
        );
        assert_eq!(
            eval(&mut s, &mut p, 0x0221),
            Gate::Hold(ControlWord::CMD_SHUTDOWN)
        );
        assert_eq!(eval(&mut s, &mut p, 0x0221), Gate::Proceed);
        eval(&mut s, &mut p, 0);
        assert_eq!(eval(&mut s, &mut p, 0x0221), Gate::Proceed);
    }

    #[test]
    fn switch_on_disabled_forces_disable() {
        let mut s = Supervisor::new(&recovery(0, 0));
        let mut p = Pacer::new();
        assert_eq!(eval(&mut s, &mut p, 0x0240), Gate::Disable);
        assert_eq!(eval(&mut s, &mut p, 0x0221), Gate::Proceed);
    }

    #[test]
    fn cooldown_ends_in_proceed_when_drive_is_already_ready() {
        let mut s = Supervisor::new(&recovery(2, 0));
        let mut p = Pacer::new();
        eval(&mut s, &mut p, 0x0208);
        // Shutdown during the hold moved the drive to ready-to-switch-on.
        assert_eq!(
            eval(&mut s, &mut p, 0x0240),
            Gate::Recover(ControlWord::CMD_SHUTDOWN)
        );
        assert_eq!(
            eval(&mut s, &mut p, 0x0231),
            Gate::Recover(ControlWord::CMD_SHUTDOWN)
        );
        assert_eq!(eval(&mut s, &mut p, 0x0231), Gate::Proceed);
    }

    #[test]
    fn records_fault_code() {
        let mut s = Supervisor::new(&recovery(0, 0));
        let mut p = Pacer::new();
        p.advance(MS);
        s.evaluate(StatusWord::from_raw(0x0208), 0x7500, &mut p);
        assert_eq!(s.fault_code(), 0x7500);
    }
}
