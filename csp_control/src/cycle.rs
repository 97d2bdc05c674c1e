//! Cyclic runner: exchange → axis → sleep.
//!
//! Drives one [`CspAxis`] against a [`FieldbusMaster`] at the configured
//! period. The axis itself never sleeps or reads a clock; the runner
//! measures the time between cycle starts and hands it in as `elapsed`.
//!
//! ## RT Setup
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to the chosen core.
//! 4. `SCHED_FIFO` at the chosen priority.
//!
//! All four are no-ops without the `rt` feature.
//!
//! ## Pacing
//! With `rt`: `clock_nanosleep(TIMER_ABSTIME)` on `CLOCK_MONOTONIC`, and
//! an overrun aborts the loop. Without: `std::thread::sleep` for the
//! remainder of the period, overruns only counted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use csp_common::bus::{BusError, FieldbusMaster};
use thiserror::Error;
use tracing::debug;

use crate::axis::CspAxis;

/// Cycles between diagnostic log lines.
pub const DIAG_INTERVAL_CYCLES: u64 = 1000;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle body duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    sum_cycle_ns: i64,
    /// Cycles whose body exceeded the period.
    pub overruns: u64,
    /// Largest deviation of the measured period from nominal [ns].
    pub max_jitter_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_jitter_ns: 0,
        }
    }

    /// Record one cycle body duration and the period jitter.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, jitter_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_jitter_ns = self.max_jitter_ns.max(jitter_ns.abs());
    }

    /// Average cycle body duration [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or cycle execution.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Master exchange failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Cycle body exceeded the period.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun { actual_ns: i64, budget_ns: i64 },
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop does not fault pages in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence. Call once before [`CycleRunner::run`].
///
/// CLI defaults: core 1 leaves core 0 to the kernel and housekeeping;
/// priority 80 sits above default threaded IRQ handlers (50) and below
/// the kernel's per-CPU threads at 99. Raise the field-bus NIC IRQ thread
/// above 80 if the master needs it on the same core.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    debug!(
        "CSP cycle thread pinned to core {} at SCHED_FIFO {}",
        cpu_core, rt_priority
    );
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the master and the axis and paces them.
pub struct CycleRunner<M: FieldbusMaster> {
    master: M,
    axis: CspAxis,
    cycle_time: Duration,
    /// Timing statistics.
    pub stats: CycleStats,
}

impl<M: FieldbusMaster> CycleRunner<M> {
    /// Runner at the axis' configured period. The axis should already be
    /// initialized against `master`.
    pub fn new(master: M, axis: CspAxis) -> Self {
        let period_ms = axis.config().motion.cycle_period_ms.max(1);
        Self {
            master,
            axis,
            cycle_time: Duration::from_millis(period_ms as u64),
            stats: CycleStats::new(),
        }
    }

    #[inline]
    pub fn axis(&self) -> &CspAxis {
        &self.axis
    }

    #[inline]
    pub fn master(&self) -> &M {
        &self.master
    }

    #[inline]
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    #[inline]
    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    /// One cycle body: exchange, then run the axis on the fresh image.
    pub fn step(&mut self, elapsed: Duration) -> Result<(), CycleError> {
        self.master.exchange()?;
        self.axis.run(self.master.process_image_mut(), elapsed);
        Ok(())
    }

    /// Run until `running` is cleared or `max_cycles` (0 = unlimited) is reached.
    pub fn run(&mut self, running: &AtomicBool, max_cycles: u64) -> Result<(), CycleError> {
        self.run_with(running, max_cycles, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `before_cycle(master, n)` ahead of
    /// every cycle body (fault injection, scripted disturbances).
    pub fn run_with<F>(
        &mut self,
        running: &AtomicBool,
        max_cycles: u64,
        before_cycle: F,
    ) -> Result<(), CycleError>
    where
        F: FnMut(&mut M, u64),
    {
        #[cfg(feature = "rt")]
        {
            self.run_rt_loop(running, max_cycles, before_cycle)
        }

        #[cfg(not(feature = "rt"))]
        {
            self.run_sim_loop(running, max_cycles, before_cycle)
        }
    }

    #[inline]
    fn budget_reached(&self, max_cycles: u64) -> bool {
        max_cycles != 0 && self.stats.cycle_count >= max_cycles
    }

    fn log_diagnostics(&self) {
        if self.stats.cycle_count % DIAG_INTERVAL_CYCLES == 0 {
            let d = self.axis.diagnostics();
            debug!(
                "cycle={} state={:?} target={} dir={:?} edge={} fe_warn={} fault={} err={:#06x}",
                self.stats.cycle_count,
                d.enable_state,
                d.target,
                d.direction,
                d.edge,
                d.tracking_warning,
                d.fault_active,
                d.last_error_code
            );
        }
    }

    /// RT loop using `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop<F>(
        &mut self,
        running: &AtomicBool,
        max_cycles: u64,
        mut before_cycle: F,
    ) -> Result<(), CycleError>
    where
        F: FnMut(&mut M, u64),
    {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || {
            clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))
        };
        let budget_ns = self.cycle_time.as_nanos() as i64;
        let mut next_wake = now()?;
        let mut last_start = next_wake;

        while running.load(Ordering::Relaxed) && !self.budget_reached(max_cycles) {
            next_wake = timespec_add_ns(next_wake, budget_ns);

            let cycle_start = now()?;
            let period_ns = timespec_diff_ns(&cycle_start, &last_start);
            last_start = cycle_start;

            before_cycle(&mut self.master, self.stats.cycle_count);
            self.step(Duration::from_nanos(period_ns.max(0) as u64))?;

            let duration_ns = timespec_diff_ns(&now()?, &cycle_start);
            let jitter_ns = if self.stats.cycle_count == 0 {
                0
            } else {
                period_ns - budget_ns
            };
            self.stats.record(duration_ns, jitter_ns);
            self.log_diagnostics();

            if duration_ns > budget_ns {
                self.stats.overruns += 1;
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration_ns,
                    budget_ns,
                });
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    /// Simulation loop using `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop<F>(
        &mut self,
        running: &AtomicBool,
        max_cycles: u64,
        mut before_cycle: F,
    ) -> Result<(), CycleError>
    where
        F: FnMut(&mut M, u64),
    {
        use std::time::Instant;

        let budget_ns = self.cycle_time.as_nanos() as i64;
        let mut last_start = Instant::now();

        while running.load(Ordering::Relaxed) && !self.budget_reached(max_cycles) {
            let cycle_start = Instant::now();
            let period = cycle_start.duration_since(last_start);
            last_start = cycle_start;

            before_cycle(&mut self.master, self.stats.cycle_count);
            self.step(period)?;

            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;
            let jitter_ns = if self.stats.cycle_count == 0 {
                0
            } else {
                period.as_nanos() as i64 - budget_ns
            };
            self.stats.record(duration_ns, jitter_ns);
            self.log_diagnostics();

            if duration_ns > budget_ns {
                self.stats.overruns += 1;
            }

            if let Some(remaining) = self.cycle_time.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let total = ts.tv_nsec() as i64 + ns;
    let secs = ts.tv_sec() as i64 + total.div_euclid(1_000_000_000);
    let nanos = total.rem_euclid(1_000_000_000);
    TimeSpec::new(secs as _, nanos as _)
}

/// `a - b` in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() as i64 - b.tv_sec() as i64) * 1_000_000_000
        + (a.tv_nsec() as i64 - b.tv_nsec() as i64)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);

        stats.record(40_000, 2_000);
        stats.record(60_000, -5_000);
        assert_eq!(stats.cycle_count, 2);
        assert_eq!(stats.last_cycle_ns, 60_000);
        assert_eq!(stats.min_cycle_ns, 40_000);
        assert_eq!(stats.max_cycle_ns, 60_000);
        assert_eq!(stats.avg_cycle_ns(), 50_000);
        assert_eq!(stats.max_jitter_ns, 5_000);
    }

    #[test]
    fn rt_setup_without_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        assert!(rt_setup(0, 80).is_ok());
    }

    #[test]
    fn cycle_error_display() {
        let err = CycleError::CycleOverrun {
            actual_ns: 1_500_000,
            budget_ns: 1_000_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("1500000"));
        assert!(msg.contains("1000000"));

        let err: CycleError = BusError::Transport("frame lost".into()).into();
        assert!(err.to_string().contains("frame lost"));
    }
}
