//! CSP setpoint generator.
//!
//! Produces a back-and-forth target stream between `-limit` and `+limit`.
//! One tick per configured period:
//!
//! - **Moving**: add `direction × step`, scaled linearly during the ramp
//!   window (never below one count). Overshooting a limit clamps exactly to
//!   it and starts the dwell.
//! - **Paused**: count the dwell down; at zero, resume opposite to the
//!   direction that hit the limit and re-arm the ramp.
//!
//! Each tick also decides the new-setpoint edge (control word bit 4).

use std::time::Duration;

use csp_common::cia402::ControlWord;
use csp_common::config::{EdgePolicy, MotionConfig};
use tracing::{debug, warn};

use crate::timing::Pacer;

/// Motion direction of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
    /// Dwelling at a limit.
    Paused,
}

impl Direction {
    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
            Self::Paused => 0,
        }
    }

    /// Direction to resume in after a stop caused by `self`.
    #[inline]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward | Self::Paused => Self::Forward,
        }
    }
}

/// Result of one generator tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorTick {
    /// Target to write [counts].
    pub target: i32,
    /// Applied increment [counts] (zero while dwelling).
    pub increment: i32,
    /// Enable-operation word including the current edge bit.
    pub control_word: ControlWord,
}

/// Setpoint generator state.
#[derive(Debug, Clone)]
pub struct SetpointGenerator {
    period: Duration,
    step: i64,
    limit: i64,
    dwell_ticks: u32,
    ramp_ticks: u32,
    policy: EdgePolicy,

    target: i32,
    direction: Direction,
    /// Direction that caused the last limit stop.
    stopped_by: Direction,
    dwell_rem: u32,
    ramp_rem: u32,
    edge: bool,
}

impl SetpointGenerator {
    pub fn new(motion: &MotionConfig) -> Self {
        Self {
            period: Duration::from_millis(motion.cycle_period_ms as u64),
            step: (motion.step_counts as i64).abs(),
            limit: (motion.limit_counts as i64).abs(),
            dwell_ticks: motion.dwell_ticks(),
            ramp_ticks: motion.ramp_ticks(),
            policy: motion.edge_policy,
            target: 0,
            direction: Direction::Forward,
            stopped_by: Direction::Forward,
            dwell_rem: 0,
            ramp_rem: 0,
            edge: false,
        }
    }

    #[inline]
    pub fn target(&self) -> i32 {
        self.target
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn edge(&self) -> bool {
        self.edge
    }

    #[inline]
    pub fn dwell_remaining(&self) -> u32 {
        self.dwell_rem
    }

    #[inline]
    pub fn ramp_remaining(&self) -> u32 {
        self.ramp_rem
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Latch the target from the drive's actual position, clamped to
    /// ±limit. Returns the latched target.
    pub fn align(&mut self, actual_position: i32) -> i32 {
        let latched = (actual_position as i64).clamp(-self.limit, self.limit) as i32;
        if latched != actual_position && latched != self.target {
            warn!(
                "Actual position {} outside ±{}, latching target {}",
                actual_position, self.limit, latched
            );
        }
        self.target = latched;
        latched
    }

    /// Re-arm the ramp window and clear the edge bit (entering operation
    /// enabled, where the last word written was a bare 0x000F).
    pub fn start(&mut self) {
        self.ramp_rem = self.ramp_ticks;
        self.edge = false;
    }

    /// Tick if a full period has accumulated on `pacer`, re-marking it.
    pub fn advance(&mut self, pacer: &mut Pacer) -> Option<GeneratorTick> {
        if !pacer.due(self.period) {
            return None;
        }
        let tick = self.tick();
        pacer.mark();
        Some(tick)
    }

    /// Unconditional tick.
    pub fn tick(&mut self) -> GeneratorTick {
        let prev = self.target;

        if self.direction == Direction::Paused {
            self.dwell_rem = self.dwell_rem.saturating_sub(1);
            if self.dwell_rem == 0 {
                self.resume();
            }
        } else {
            let next = prev as i64 + self.increment();
            if next > self.limit || next < -self.limit {
                self.target = next.clamp(-self.limit, self.limit) as i32;
                self.stopped_by = self.direction;
                self.direction = Direction::Paused;
                self.dwell_rem = self.dwell_ticks;
                debug!(
                    "Limit {} reached, dwelling {} ticks",
                    self.target, self.dwell_rem
                );
                if self.dwell_rem == 0 {
                    self.resume();
                }
            } else {
                self.target = next as i32;
            }
        }

        let flip = match self.policy {
            EdgePolicy::ToggleEveryTick => true,
            EdgePolicy::ToggleOnChange => self.target != prev,
        };
        if flip {
            self.edge = !self.edge;
        }

        GeneratorTick {
            target: self.target,
            increment: (self.target as i64 - prev as i64) as i32,
            control_word: ControlWord::enable_operation_with_edge(self.edge),
        }
    }

    /// Signed increment for a moving tick, consuming one ramp tick.
    fn increment(&mut self) -> i64 {
        let sign = self.direction.sign();
        let mut delta = sign * self.step;
        if self.ramp_rem > 0 {
            let total = self.ramp_ticks.max(1) as i64;
            let used = total - self.ramp_rem as i64 + 1;
            delta = delta * used / total;
            if delta == 0 {
                delta = sign;
            }
            self.ramp_rem -= 1;
        }
        delta
    }

    fn resume(&mut self) {
        self.direction = self.stopped_by.reversed();
        self.ramp_rem = self.ramp_ticks;
        debug!("Dwell complete, resuming {:?}", self.direction);
    }
}
