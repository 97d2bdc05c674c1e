//! # CSP Control
//!
//! Runs one CSP axis against the simulation master.
//!
//! Loads an optional TOML drive configuration, binds the axis to the first
//! slave, performs RT setup and enters the cycle loop until Ctrl-C or the
//! cycle budget is exhausted.

use clap::Parser;
use csp_common::config::{DriveConfig, LogLevel};
use csp_control::cycle::{CycleRunner, rt_setup};
use csp_control::{CspAxis, InitStatus};
use csp_hal::{SimDriveConfig, SimulationMaster};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Error code injected by `--fault-at` (generic drive fault).
const INJECTED_FAULT_CODE: u16 = 0x7500;

/// CSP Control - CiA-402 cyclic synchronous position runner
#[derive(Parser, Debug)]
#[command(name = "csp_control")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Cyclic CSP servo core driving a simulated CiA-402 drive")]
struct Args {
    /// Drive configuration TOML. Built-in defaults when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of cycles to run (0 = until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Inject a drive fault before this cycle (simulation only).
    #[arg(long, value_name = "CYCLE")]
    fault_at: Option<u64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Configuration is loaded before tracing so its log_level can apply.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            error!("FATAL: {e}");
            process::exit(1);
        }
    };
    setup_tracing(&args, config.log_level);

    info!("CSP Control v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("CSP Control shutdown complete");
}

fn load_config(args: &Args) -> Result<DriveConfig, csp_common::config::ConfigError> {
    match args.config {
        Some(ref path) => DriveConfig::load_validated(path),
        None => Ok(DriveConfig::default()),
    }
}

fn run(args: &Args, config: DriveConfig) -> Result<(), Box<dyn std::error::Error>> {
    match args.config {
        Some(ref path) => info!("Config loaded from {}", path.display()),
        None => info!("No --config given, using built-in defaults"),
    }
    info!(
        "Config OK: period={}ms step={} limit={} dwell={}ms ramp={}ms policy={:?}",
        config.motion.cycle_period_ms,
        config.motion.step_counts,
        config.motion.limit_counts,
        config.motion.dwell_ms,
        config.motion.ramp_ms,
        config.motion.edge_policy,
    );

    let cycle_time = Duration::from_millis(config.motion.cycle_period_ms as u64);
    let mut master = SimulationMaster::single_drive(cycle_time, SimDriveConfig::default());
    let slave = master
        .slaves()
        .first()
        .copied()
        .ok_or("simulation bus has no slaves")?;
    let layout = master
        .pdo_layout(slave.position)
        .ok_or("no PDO layout for slave")?;

    let mut axis = CspAxis::new(config);
    if axis.init(&mut master, &slave, &layout) == InitStatus::Unmapped {
        warn!("Axis is unmapped; the loop will run without commanding the drive");
    }

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut runner = CycleRunner::new(master, axis);
    info!(
        "Entering cycle loop ({} cycles)",
        if args.cycles == 0 {
            "unbounded".to_string()
        } else {
            args.cycles.to_string()
        }
    );

    let fault_at = args.fault_at;
    let result = runner.run_with(&running, args.cycles, |master, cycle| {
        if fault_at == Some(cycle) {
            warn!("Injecting drive fault {:#06x} at cycle {}", INJECTED_FAULT_CODE, cycle);
            if let Err(e) = master.inject_fault(slave.position, INJECTED_FAULT_CODE) {
                warn!("Fault injection failed: {e}");
            }
        }
    });

    let stats = &runner.stats;
    info!(
        "Cycles={} min={}ns max={}ns avg={}ns jitter={}ns overruns={}",
        stats.cycle_count,
        if stats.cycle_count == 0 { 0 } else { stats.min_cycle_ns },
        stats.max_cycle_ns,
        stats.avg_cycle_ns(),
        stats.max_jitter_ns,
        stats.overruns
    );
    let d = runner.axis().diagnostics();
    info!(
        "Final: state={:?} target={} fe_warn={} last_error={:#06x}",
        d.enable_state, d.target, d.tracking_warning, d.last_error_code
    );

    result?;
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive: Directive = if args.verbose {
        Level::DEBUG.into()
    } else {
        level
            .as_directive()
            .parse()
            .unwrap_or_else(|_| Level::INFO.into())
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
