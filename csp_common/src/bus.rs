//! Field-bus master trait and mapping types.
//!
//! This module defines:
//! - `FieldbusMaster` trait - Interface the servo core uses to bind its
//!   process image and program the drive
//! - `BusError` enum - Error types for master operations
//! - `SlaveIdentity`, `PdoLayout`, `ImageBinding` - Mapping descriptors
//! - `ProcessImage` - The master-owned input/output byte regions
//!
//! Discovery, transport and PRE-OP/OP handling live behind the trait; the
//! servo core never sees frames, only the mapped bytes.

use thiserror::Error;

use crate::consts::{INPUTS_LEN, OUTPUTS_LEN};
use crate::image::{ImageError, InputImage, OutputImage};

/// Error types for field-bus master operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Process data mapping could not be established.
    #[error("Mapping failed: {0}")]
    MappingFailed(String),

    /// Mapping offset is not on a byte boundary.
    #[error("Unaligned process data offset: {bits} bits")]
    UnalignedOffset { bits: usize },

    /// Slave position not present on the bus.
    #[error("Slave {0} not found")]
    SlaveNotFound(u16),

    /// SDO download aborted by the slave.
    #[error("SDO {index:#06x}:{sub} aborted with code {code:#010x}")]
    SdoAbort { index: u16, sub: u8, code: u32 },

    /// Cyclic exchange failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Identity of one slave as reported by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveIdentity {
    /// Position on the bus (0-based).
    pub position: u16,
    pub vendor_id: u32,
    pub product_id: u32,
}

/// Process data layout as measured from the bus configuration.
///
/// Widths are what the mapping declares; offsets locate the drive's
/// regions inside the master's process image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoLayout {
    pub input_bits: usize,
    pub output_bits: usize,
    pub input_offset_bits: usize,
    pub output_offset_bits: usize,
}

impl PdoLayout {
    /// Layout matching the fixed region sizes at the given bit offsets.
    pub const fn fixed(input_offset_bits: usize, output_offset_bits: usize) -> Self {
        Self {
            input_bits: INPUTS_LEN * 8,
            output_bits: OUTPUTS_LEN * 8,
            input_offset_bits,
            output_offset_bits,
        }
    }
}

/// Byte offsets of one drive's regions inside a [`ProcessImage`].
///
/// Region lengths are always the fixed [`INPUTS_LEN`] / [`OUTPUTS_LEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBinding {
    pub input_offset: usize,
    pub output_offset: usize,
}

impl ImageBinding {
    /// Translate bit offsets to a byte binding.
    ///
    /// # Errors
    /// `BusError::UnalignedOffset` if either offset is not a multiple of 8.
    pub fn from_bit_offsets(input_bits: usize, output_bits: usize) -> Result<Self, BusError> {
        if input_bits % 8 != 0 {
            return Err(BusError::UnalignedOffset { bits: input_bits });
        }
        if output_bits % 8 != 0 {
            return Err(BusError::UnalignedOffset { bits: output_bits });
        }
        Ok(Self {
            input_offset: input_bits / 8,
            output_offset: output_bits / 8,
        })
    }

    /// Borrow this drive's input region.
    pub fn inputs<'a>(&self, image: &'a ProcessImage) -> Result<InputImage<'a>, ImageError> {
        let region = image
            .inputs
            .get(self.input_offset..)
            .ok_or(ImageError::OutOfBounds {
                offset: self.input_offset,
                len: INPUTS_LEN,
                available: image.inputs.len(),
            })?;
        InputImage::new(region)
    }

    /// Borrow both regions at once: inputs shared, outputs exclusive.
    pub fn split<'a>(
        &self,
        image: &'a mut ProcessImage,
    ) -> Result<(InputImage<'a>, OutputImage<'a>), ImageError> {
        let in_len = image.inputs.len();
        let out_len = image.outputs.len();
        let inputs = image
            .inputs
            .get(self.input_offset..)
            .ok_or(ImageError::OutOfBounds {
                offset: self.input_offset,
                len: INPUTS_LEN,
                available: in_len,
            })?;
        let outputs = image
            .outputs
            .get_mut(self.output_offset..)
            .ok_or(ImageError::OutOfBounds {
                offset: self.output_offset,
                len: OUTPUTS_LEN,
                available: out_len,
            })?;
        Ok((InputImage::new(inputs)?, OutputImage::new(outputs)?))
    }
}

/// Master-owned process image: one input and one output byte region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessImage {
    pub inputs: Vec<u8>,
    pub outputs: Vec<u8>,
}

impl ProcessImage {
    /// Zero-filled image with the given region sizes [bytes].
    pub fn new(input_len: usize, output_len: usize) -> Self {
        Self {
            inputs: vec![0; input_len],
            outputs: vec![0; output_len],
        }
    }
}

/// Interface to a field-bus master.
///
/// # Lifecycle
///
/// 1. `map_process_image()` - once per drive before cyclic operation
/// 2. `sdo_write_u8()` / `sdo_write_u32()` - optional startup programming
/// 3. `exchange()` + `process_image_mut()` - every cycle
pub trait FieldbusMaster {
    /// Returns the master's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Locate `slave`'s regions inside the process image.
    ///
    /// # Errors
    /// `BusError::SlaveNotFound`, `BusError::UnalignedOffset` or
    /// `BusError::MappingFailed` if the regions cannot be bound.
    fn map_process_image(
        &mut self,
        slave: &SlaveIdentity,
        layout: &PdoLayout,
    ) -> Result<ImageBinding, BusError>;

    /// Expedited SDO download of an 8-bit object.
    fn sdo_write_u8(&mut self, slave: u16, index: u16, sub: u8, value: u8)
    -> Result<(), BusError>;

    /// Expedited SDO download of a 32-bit object.
    fn sdo_write_u32(
        &mut self,
        slave: u16,
        index: u16,
        sub: u8,
        value: u32,
    ) -> Result<(), BusError>;

    /// Transmit outputs and receive fresh inputs for one cycle.
    fn exchange(&mut self) -> Result<(), BusError>;

    /// The process image refreshed by the last `exchange()`.
    fn process_image_mut(&mut self) -> &mut ProcessImage;
}

// ─── Tests ──────────────────────────────────────────────────────────
