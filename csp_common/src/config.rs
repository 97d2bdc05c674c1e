//! Drive configuration loaded from TOML.
//!
//! Every field has a serde default equal to the reference commissioning
//! values, so an empty file yields a usable configuration. Sections reject
//! unknown keys to catch typos in knob names.
//!
//! # TOML Example
//!
//! ```toml
//! log_level = "debug"
//!
//! [motion]
//! cycle_period_ms = 1
//! step_counts = 300
//! limit_counts = 200000
//! dwell_ms = 500
//! ramp_ms = 300
//! edge_policy = "toggle_on_change"
//!
//! [monitor]
//! tracking_window_counts = 20000
//! warn_percent = 80
//!
//! [recovery]
//! fault_cooldown_ms = 250
//! comm_cooldown_ms = 0
//!
//! [drive]
//! vendor_id = 0x83
//! product_id = 0x02
//!
//! [sdo]
//! write_sync_watchdog = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::consts::{
    CYCLE_PERIOD_MS_MAX, CYCLE_PERIOD_MS_MIN, DEFAULT_COMM_COOLDOWN_MS, DEFAULT_CYCLE_PERIOD_MS,
    DEFAULT_DWELL_MS, DEFAULT_FAULT_COOLDOWN_MS, DEFAULT_LIMIT_COUNTS, DEFAULT_RAMP_MS,
    DEFAULT_STEP_COUNTS, DEFAULT_SYNC_WATCHDOG, DEFAULT_TRACKING_WINDOW, DEFAULT_WARN_PERCENT,
    OMRON_VENDOR_ID, R88D_1SN_PRODUCT_ID, TRACKING_CLEAR_PERCENT,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// File exists but could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(String),

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// When the CSP new-setpoint bit (control word bit 4) toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Toggle on every generator tick.
    ToggleEveryTick,
    /// Toggle only when the target differs from the previous tick.
    #[default]
    ToggleOnChange,
}

// ─── Sections ───────────────────────────────────────────────────────

/// Setpoint generator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Generator period [ms]; also written to 0x60C2:1 in µs.
    #[serde(default = "default_cycle_period_ms")]
    pub cycle_period_ms: u32,

    /// Full increment per tick [counts].
    #[serde(default = "default_step_counts")]
    pub step_counts: i32,

    /// Symmetric software position limit [counts].
    #[serde(default = "default_limit_counts")]
    pub limit_counts: i32,

    /// Hold time at a limit before reversing [ms].
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u32,

    /// Acceleration ramp after enable and after each dwell [ms].
    #[serde(default = "default_ramp_ms")]
    pub ramp_ms: u32,

    #[serde(default)]
    pub edge_policy: EdgePolicy,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: DEFAULT_CYCLE_PERIOD_MS,
            step_counts: DEFAULT_STEP_COUNTS,
            limit_counts: DEFAULT_LIMIT_COUNTS,
            dwell_ms: DEFAULT_DWELL_MS,
            ramp_ms: DEFAULT_RAMP_MS,
            edge_policy: EdgePolicy::default(),
        }
    }
}

impl MotionConfig {
    /// Dwell length in generator ticks.
    #[inline]
    pub fn dwell_ticks(&self) -> u32 {
        self.dwell_ms / self.cycle_period_ms.max(1)
    }

    /// Ramp window length in generator ticks.
    #[inline]
    pub fn ramp_ticks(&self) -> u32 {
        self.ramp_ms / self.cycle_period_ms.max(1)
    }
}

/// Tracking-error monitor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Tracking-error window [counts]; also written to 0x6065:0.
    #[serde(default = "default_tracking_window")]
    pub tracking_window_counts: i32,

    /// Warning latches above this share of the window [%].
    #[serde(default = "default_warn_percent")]
    pub warn_percent: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tracking_window_counts: DEFAULT_TRACKING_WINDOW,
            warn_percent: DEFAULT_WARN_PERCENT,
        }
    }
}

/// Fault and communication recovery holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Shutdown hold after the drive clears a fault [ms].
    #[serde(default = "default_fault_cooldown_ms")]
    pub fault_cooldown_ms: u32,

    /// Shutdown hold applied once at startup [ms].
    #[serde(default = "default_comm_cooldown_ms")]
    pub comm_cooldown_ms: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            fault_cooldown_ms: DEFAULT_FAULT_COOLDOWN_MS,
            comm_cooldown_ms: DEFAULT_COMM_COOLDOWN_MS,
        }
    }
}

/// Expected drive identity. A mismatch is reported, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveIdentityConfig {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u32,
    #[serde(default = "default_product_id")]
    pub product_id: u32,
}

impl Default for DriveIdentityConfig {
    fn default() -> Self {
        Self {
            vendor_id: OMRON_VENDOR_ID,
            product_id: R88D_1SN_PRODUCT_ID,
        }
    }
}

/// Startup SDO program switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SdoConfig {
    /// 0x6060:0 = 8 (CSP).
    #[serde(default = "default_true")]
    pub write_mode_of_operation: bool,
    /// 0x60C2:1 = cycle period [µs].
    #[serde(default = "default_true")]
    pub write_interpolation_period: bool,
    /// 0x6065:0 = tracking-error window.
    #[serde(default = "default_true")]
    pub write_tracking_window: bool,
    /// 0x10F1:1 = `sync_watchdog_value`. Vendor specific, off by default.
    #[serde(default)]
    pub write_sync_watchdog: bool,
    #[serde(default = "default_sync_watchdog")]
    pub sync_watchdog_value: u32,
}

impl Default for SdoConfig {
    fn default() -> Self {
        Self {
            write_mode_of_operation: true,
            write_interpolation_period: true,
            write_tracking_window: true,
            write_sync_watchdog: false,
            sync_watchdog_value: DEFAULT_SYNC_WATCHDOG,
        }
    }
}

fn default_cycle_period_ms() -> u32 {
    DEFAULT_CYCLE_PERIOD_MS
}
fn default_step_counts() -> i32 {
    DEFAULT_STEP_COUNTS
}
fn default_limit_counts() -> i32 {
    DEFAULT_LIMIT_COUNTS
}
fn default_dwell_ms() -> u32 {
    DEFAULT_DWELL_MS
}
fn default_ramp_ms() -> u32 {
    DEFAULT_RAMP_MS
}
fn default_tracking_window() -> i32 {
    DEFAULT_TRACKING_WINDOW
}
fn default_warn_percent() -> u8 {
    DEFAULT_WARN_PERCENT
}
fn default_fault_cooldown_ms() -> u32 {
    DEFAULT_FAULT_COOLDOWN_MS
}
fn default_comm_cooldown_ms() -> u32 {
    DEFAULT_COMM_COOLDOWN_MS
}
fn default_vendor_id() -> u32 {
    OMRON_VENDOR_ID
}
fn default_product_id() -> u32 {
    R88D_1SN_PRODUCT_ID
}
fn default_sync_watchdog() -> u32 {
    DEFAULT_SYNC_WATCHDOG
}
fn default_true() -> bool {
    true
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete configuration of one CSP axis.
///
/// Immutable once the axis is initialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub drive: DriveIdentityConfig,
    #[serde(default)]
    pub sdo: SdoConfig,
}

impl DriveConfig {
    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a TOML file.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        debug!(
            "Drive config {} validated (period={}ms, window={})",
            path.display(),
            config.motion.cycle_period_ms,
            config.monitor.tracking_window_counts
        );
        Ok(config)
    }

    /// Validate parameter bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `cycle_period_ms` is outside the accepted range
    /// - `step_counts` or `limit_counts` is not positive, or step exceeds limit
    /// - `tracking_window_counts` is not positive
    /// - `warn_percent` is not above the 40 % clear level or exceeds 100
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.motion;
        if m.cycle_period_ms < CYCLE_PERIOD_MS_MIN || m.cycle_period_ms > CYCLE_PERIOD_MS_MAX {
            return Err(ConfigError::ValidationError(format!(
                "cycle_period_ms {} out of range [{}, {}]",
                m.cycle_period_ms, CYCLE_PERIOD_MS_MIN, CYCLE_PERIOD_MS_MAX
            )));
        }
        if m.step_counts <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "step_counts must be positive, got {}",
                m.step_counts
            )));
        }
        if m.limit_counts <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "limit_counts must be positive, got {}",
                m.limit_counts
            )));
        }
        if m.step_counts > m.limit_counts {
            return Err(ConfigError::ValidationError(format!(
                "step_counts {} exceeds limit_counts {}",
                m.step_counts, m.limit_counts
            )));
        }

        let mon = &self.monitor;
        if mon.tracking_window_counts <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "tracking_window_counts must be positive, got {}",
                mon.tracking_window_counts
            )));
        }
        if mon.warn_percent <= TRACKING_CLEAR_PERCENT || mon.warn_percent > 100 {
            return Err(ConfigError::ValidationError(format!(
                "warn_percent {} out of range ({}, 100]",
                mon.warn_percent, TRACKING_CLEAR_PERCENT
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::Io` if it cannot be read
/// - Returns `ConfigError::ParseError` if TOML syntax or a field is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::Io(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
