//! CSP Common Library
//!
//! Shared definitions for the CSP servo workspace: CiA-402 status/control
//! words, the fixed process image layout, drive configuration, and the
//! field-bus master interface implemented by `csp_hal`.
//!
//! # Module Structure
//!
//! - [`consts`] - Layout sizes, protocol constants and configuration defaults
//! - [`cia402`] - Status word flags and control word commands
//! - [`image`] - Bounds-checked little-endian process image accessors
//! - [`config`] - TOML drive configuration and loader
//! - [`bus`] - Field-bus master trait, slave identity and mapping types
//! - [`prelude`] - Common re-exports for convenience

pub mod bus;
pub mod cia402;
pub mod config;
pub mod consts;
pub mod image;
pub mod prelude;
