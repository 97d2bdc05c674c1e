//! Tracking-error monitor.
//!
//! Observational only: latches a warning when |error| rises above
//! `warn_percent` of the window and clears it once |error| drops below
//! 40 % of the window. Nothing in between changes the latch.

use csp_common::config::MonitorConfig;
use csp_common::consts::TRACKING_CLEAR_PERCENT;
use tracing::{info, warn};

/// Latch transition reported by [`TrackingMonitor::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    Latched,
    Cleared,
}

/// Hysteretic tracking-error latch.
#[derive(Debug, Clone)]
pub struct TrackingMonitor {
    /// Latch threshold [counts].
    high: i64,
    /// Clear threshold [counts].
    low: i64,
    latched: bool,
}

impl TrackingMonitor {
    pub fn new(monitor: &MonitorConfig) -> Self {
        let window = monitor.tracking_window_counts as i64;
        Self {
            high: window * monitor.warn_percent as i64 / 100,
            low: window * TRACKING_CLEAR_PERCENT as i64 / 100,
            latched: false,
        }
    }

    #[inline]
    pub fn latched(&self) -> bool {
        self.latched
    }

    #[inline]
    pub fn thresholds(&self) -> (i64, i64) {
        (self.high, self.low)
    }

    /// Check one reported tracking error [counts].
    pub fn evaluate(&mut self, tracking_error: i32) -> Option<MonitorEvent> {
        let magnitude = (tracking_error as i64).abs();
        if !self.latched && magnitude > self.high {
            self.latched = true;
            warn!(
                "Tracking error high: {} counts (limit {})",
                tracking_error, self.high
            );
            return Some(MonitorEvent::Latched);
        }
        if self.latched && magnitude < self.low {
            self.latched = false;
            info!("Tracking error back: {} counts", tracking_error);
            return Some(MonitorEvent::Cleared);
        }
        None
    }
}
