//! # CSP HAL Library
//!
//! Field-bus masters for the CSP servo core. Masters implement the
//! `FieldbusMaster` trait defined in `csp_common::bus`.
//!
//! # Module Structure
//!
//! - [`drivers`] - Master implementations (currently the simulation bus)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  exchange()   ┌───────────────────┐
//! │  CspAxis     │◄─────────────►│ FieldbusMaster    │
//! │ (csp_control)│ ProcessImage  │ (trait object)    │
//! └──────────────┘               └─────────┬─────────┘
//!                                          │
//!                                          ▼
//!                                ┌───────────────────┐
//!                                │ SimulationMaster  │
//!                                │  └ SimulatedDrive │
//!                                └───────────────────┘
//! ```

pub mod drivers;

pub use crate::drivers::create_master;
pub use crate::drivers::simulation::{SimDriveConfig, SimulatedDrive, SimulationMaster};
