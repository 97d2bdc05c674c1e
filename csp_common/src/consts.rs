//! System-wide constants for the CSP servo workspace.
//!
//! Single source of truth for process image sizes, CiA-402 object indices
//! and configuration defaults.

// ─── Process Image Layout ───────────────────────────────────────────

/// Input region size [bytes]: status, actual position, tracking error, error code.
pub const INPUTS_LEN: usize = 12;

/// Output region size [bytes]: control word, target position.
pub const OUTPUTS_LEN: usize = 6;

/// Input region size [bits], as declared by a field-bus mapping.
pub const INPUTS_BITS: usize = INPUTS_LEN * 8;

/// Output region size [bits].
pub const OUTPUTS_BITS: usize = OUTPUTS_LEN * 8;

// ─── Object Dictionary ──────────────────────────────────────────────

/// 0x6060:0 - modes of operation (u8).
pub const OD_MODES_OF_OPERATION: (u16, u8) = (0x6060, 0);

/// 0x60C2:1 - interpolation time period value [µs] (u32).
pub const OD_INTERPOLATION_PERIOD: (u16, u8) = (0x60C2, 1);

/// 0x6065:0 - following error window [counts] (u32).
pub const OD_FOLLOWING_ERROR_WINDOW: (u16, u8) = (0x6065, 0);

/// 0x10F1:1 - sync error watchdog setting (u32, vendor specific).
pub const OD_SYNC_WATCHDOG: (u16, u8) = (0x10F1, 1);

/// Modes-of-operation value for Cyclic Synchronous Position.
pub const MODE_CSP: u8 = 8;

/// Omron Corporation EtherCAT vendor id.
pub const OMRON_VENDOR_ID: u32 = 0x0000_0083;

/// Omron R88D-1SN servo drive product code.
pub const R88D_1SN_PRODUCT_ID: u32 = 0x0000_0002;

// ─── Configuration Defaults ─────────────────────────────────────────

/// Default cycle period [ms].
pub const DEFAULT_CYCLE_PERIOD_MS: u32 = 1;

/// Accepted cycle period range [ms].
pub const CYCLE_PERIOD_MS_MIN: u32 = 1;
pub const CYCLE_PERIOD_MS_MAX: u32 = 100;

/// Default increment per generator tick [counts].
pub const DEFAULT_STEP_COUNTS: i32 = 300;

/// Default symmetric software limit [counts].
pub const DEFAULT_LIMIT_COUNTS: i32 = 200_000;

/// Default hold time at a travel limit [ms].
pub const DEFAULT_DWELL_MS: u32 = 500;

/// Default acceleration ramp after enable or dwell [ms].
pub const DEFAULT_RAMP_MS: u32 = 300;

/// Default tracking-error window [counts].
pub const DEFAULT_TRACKING_WINDOW: i32 = 20_000;

/// Default warning level [% of window].
pub const DEFAULT_WARN_PERCENT: u8 = 80;

/// Clear level of the tracking-error hysteresis [% of window].
pub const TRACKING_CLEAR_PERCENT: u8 = 40;

/// Default hold in shutdown after a fault clears [ms].
pub const DEFAULT_FAULT_COOLDOWN_MS: u32 = 250;

/// Default hold in shutdown at startup [ms].
pub const DEFAULT_COMM_COOLDOWN_MS: u32 = 0;

/// Default sync watchdog value written to 0x10F1:1.
pub const DEFAULT_SYNC_WATCHDOG: u32 = 150;
