//! Common re-exports for convenience.
//!
//! ```rust
//! use csp_common::prelude::*;
//! ```

pub use crate::bus::{BusError, FieldbusMaster, ImageBinding, PdoLayout, ProcessImage, SlaveIdentity};
pub use crate::cia402::{ControlWord, DriveStateCode, StatusWord, STATE_MASK};
pub use crate::config::{ConfigError, ConfigLoader, DriveConfig, EdgePolicy, LogLevel};
pub use crate::consts::{INPUTS_BITS, INPUTS_LEN, OUTPUTS_BITS, OUTPUTS_LEN};
pub use crate::image::{DriveInputs, DriveOutputs, ImageError, InputImage, OutputImage};
