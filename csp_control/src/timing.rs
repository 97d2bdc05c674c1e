//! Soft scheduling reference.
//!
//! The core never reads a clock. The caller reports how much time passed
//! since the previous invocation; the [`Pacer`] accumulates it since the
//! last mark so countdowns and the generator period can be gated on it.
//! Marking drops any remainder, so a late call never produces a burst of
//! catch-up ticks.

use std::time::Duration;

const ONE_MS: Duration = Duration::from_millis(1);

/// Time accumulated since the last scheduling mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacer {
    since_mark: Duration,
}

impl Pacer {
    pub const fn new() -> Self {
        Self {
            since_mark: Duration::ZERO,
        }
    }

    /// Account for `elapsed` since the previous invocation.
    #[inline]
    pub fn advance(&mut self, elapsed: Duration) {
        self.since_mark = self.since_mark.saturating_add(elapsed);
    }

    /// Re-mark the reference at "now".
    #[inline]
    pub fn mark(&mut self) {
        self.since_mark = Duration::ZERO;
    }

    #[inline]
    pub fn since_mark(&self) -> Duration {
        self.since_mark
    }

    /// `true` once at least `period` has accumulated.
    #[inline]
    pub fn due(&self, period: Duration) -> bool {
        self.since_mark >= period
    }

    /// Countdown helper: decrement `remaining` by one if a millisecond has
    /// accumulated, then re-mark.
    #[inline]
    pub fn tick_down_ms(&mut self, remaining: &mut u32) {
        if self.due(ONE_MS) {
            *remaining = remaining.saturating_sub(1);
            self.mark();
        }
    }
}
