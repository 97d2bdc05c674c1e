//! Drive process image: fixed little-endian layout, bounds-checked access.
//!
//! ## Layout
//!
//! Inputs (drive → master, 12 bytes, packed):
//!
//! | Offset | Size | Object   | Field                 |
//! |--------|------|----------|-----------------------|
//! | 0      | 2    | 0x6041:0 | status word           |
//! | 2      | 4    | 0x6064:0 | actual position (i32) |
//! | 6      | 4    | 0x60F4:0 | tracking error (i32)  |
//! | 10     | 2    | 0x603F:0 | last error code       |
//!
//! Outputs (master → drive, 6 bytes, packed):
//!
//! | Offset | Size | Object   | Field                 |
//! |--------|------|----------|-----------------------|
//! | 0      | 2    | 0x6040:0 | control word          |
//! | 2      | 4    | 0x607A:0 | target position (i32) |
//!
//! Fields are unaligned; all access goes through `from_le_bytes`/`to_le_bytes`.

use static_assertions::const_assert_eq;
use thiserror::Error;

use crate::cia402::{ControlWord, StatusWord};
use crate::consts::{INPUTS_LEN, OUTPUTS_LEN};

/// Input field offsets [bytes].
pub mod input_offset {
    pub const STATUS_WORD: usize = 0;
    pub const ACTUAL_POSITION: usize = 2;
    pub const TRACKING_ERROR: usize = 6;
    pub const ERROR_CODE: usize = 10;
}

/// Output field offsets [bytes].
pub mod output_offset {
    pub const CONTROL_WORD: usize = 0;
    pub const TARGET_POSITION: usize = 2;
}

const_assert_eq!(input_offset::ERROR_CODE + 2, INPUTS_LEN);
const_assert_eq!(output_offset::TARGET_POSITION + 4, OUTPUTS_LEN);

/// Process image access error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Requested field lies outside the buffer.
    #[error("process image access out of bounds: offset {offset} + {len} > {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },
}

#[inline]
fn field<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], ImageError> {
    let end = offset.checked_add(N).ok_or(ImageError::OutOfBounds {
        offset,
        len: N,
        available: buf.len(),
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(buf.get(offset..end).ok_or(ImageError::OutOfBounds {
        offset,
        len: N,
        available: buf.len(),
    })?);
    Ok(out)
}

#[inline]
fn field_mut<const N: usize>(
    buf: &mut [u8],
    offset: usize,
    bytes: [u8; N],
) -> Result<(), ImageError> {
    let available = buf.len();
    let end = offset.checked_add(N).ok_or(ImageError::OutOfBounds {
        offset,
        len: N,
        available,
    })?;
    buf.get_mut(offset..end)
        .ok_or(ImageError::OutOfBounds {
            offset,
            len: N,
            available,
        })?
        .copy_from_slice(&bytes);
    Ok(())
}

/// Read a little-endian `u16` at `offset`.
#[inline]
pub fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ImageError> {
    field::<2>(buf, offset).map(u16::from_le_bytes)
}

/// Read a little-endian `i32` at `offset`.
#[inline]
pub fn read_i32(buf: &[u8], offset: usize) -> Result<i32, ImageError> {
    field::<4>(buf, offset).map(i32::from_le_bytes)
}

/// Write a little-endian `u16` at `offset`.
#[inline]
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) -> Result<(), ImageError> {
    field_mut(buf, offset, value.to_le_bytes())
}

/// Write a little-endian `i32` at `offset`.
#[inline]
pub fn write_i32(buf: &mut [u8], offset: usize, value: i32) -> Result<(), ImageError> {
    field_mut(buf, offset, value.to_le_bytes())
}

// ─── Region Views ───────────────────────────────────────────────────

/// Read-only view over one drive's input region.
///
/// The region length is checked once at construction; field getters
/// cannot fail afterwards.
#[derive(Debug, Clone, Copy)]
pub struct InputImage<'a> {
    bytes: &'a [u8],
}

impl<'a> InputImage<'a> {
    /// Wrap `bytes`, which must hold at least [`INPUTS_LEN`] bytes.
    pub fn new(bytes: &'a [u8]) -> Result<Self, ImageError> {
        if bytes.len() < INPUTS_LEN {
            return Err(ImageError::OutOfBounds {
                offset: 0,
                len: INPUTS_LEN,
                available: bytes.len(),
            });
        }
        Ok(Self {
            bytes: &bytes[..INPUTS_LEN],
        })
    }

    #[inline]
    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    #[inline]
    fn i32_at(&self, offset: usize) -> i32 {
        i32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    #[inline]
    pub fn status_word(&self) -> StatusWord {
        StatusWord::from_raw(self.u16_at(input_offset::STATUS_WORD))
    }

    #[inline]
    pub fn actual_position(&self) -> i32 {
        self.i32_at(input_offset::ACTUAL_POSITION)
    }

    #[inline]
    pub fn tracking_error(&self) -> i32 {
        self.i32_at(input_offset::TRACKING_ERROR)
    }

    #[inline]
    pub fn error_code(&self) -> u16 {
        self.u16_at(input_offset::ERROR_CODE)
    }

    /// Copy all fields into a [`DriveInputs`] snapshot.
    pub fn snapshot(&self) -> DriveInputs {
        DriveInputs {
            status_word: self.status_word().bits(),
            actual_position: self.actual_position(),
            tracking_error: self.tracking_error(),
            error_code: self.error_code(),
        }
    }
}

/// Mutable view over one drive's output region.
#[derive(Debug)]
pub struct OutputImage<'a> {
    bytes: &'a mut [u8],
}

impl<'a> OutputImage<'a> {
    /// Wrap `bytes`, which must hold at least [`OUTPUTS_LEN`] bytes.
    pub fn new(bytes: &'a mut [u8]) -> Result<Self, ImageError> {
        if bytes.len() < OUTPUTS_LEN {
            return Err(ImageError::OutOfBounds {
                offset: 0,
                len: OUTPUTS_LEN,
                available: bytes.len(),
            });
        }
        Ok(Self {
            bytes: &mut bytes[..OUTPUTS_LEN],
        })
    }

    #[inline]
    pub fn control_word(&self) -> ControlWord {
        let o = output_offset::CONTROL_WORD;
        ControlWord::from_raw(u16::from_le_bytes([self.bytes[o], self.bytes[o + 1]]))
    }

    #[inline]
    pub fn target_position(&self) -> i32 {
        let o = output_offset::TARGET_POSITION;
        i32::from_le_bytes([
            self.bytes[o],
            self.bytes[o + 1],
            self.bytes[o + 2],
            self.bytes[o + 3],
        ])
    }

    #[inline]
    pub fn set_control_word(&mut self, cw: ControlWord) {
        let o = output_offset::CONTROL_WORD;
        self.bytes[o..o + 2].copy_from_slice(&cw.bits().to_le_bytes());
    }

    #[inline]
    pub fn set_target_position(&mut self, target: i32) {
        let o = output_offset::TARGET_POSITION;
        self.bytes[o..o + 4].copy_from_slice(&target.to_le_bytes());
    }

    /// Copy all fields into a [`DriveOutputs`] snapshot.
    pub fn snapshot(&self) -> DriveOutputs {
        DriveOutputs {
            control_word: self.control_word().bits(),
            target_position: self.target_position(),
        }
    }
}

// ─── Plain Snapshots ────────────────────────────────────────────────

/// Decoded input region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveInputs {
    pub status_word: u16,
    pub actual_position: i32,
    pub tracking_error: i32,
    pub error_code: u16,
}

impl DriveInputs {
    /// Encode into `buf` at offset 0 (drive side of the exchange).
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), ImageError> {
        write_u16(buf, input_offset::STATUS_WORD, self.status_word)?;
        write_i32(buf, input_offset::ACTUAL_POSITION, self.actual_position)?;
        write_i32(buf, input_offset::TRACKING_ERROR, self.tracking_error)?;
        write_u16(buf, input_offset::ERROR_CODE, self.error_code)
    }
}

/// Decoded output region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveOutputs {
    pub control_word: u16,
    pub target_position: i32,
}

impl DriveOutputs {
    /// Decode from `buf` at offset 0.
    pub fn decode(buf: &[u8]) -> Result<Self, ImageError> {
        Ok(Self {
            control_word: read_u16(buf, output_offset::CONTROL_WORD)?,
            target_position: read_i32(buf, output_offset::TARGET_POSITION)?,
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_fields_decode_little_endian() {
        let bytes = [
            0x37, 0x02, // status 0x0237
            0x10, 0x27, 0x00, 0x00, // position 10000
            0xFF, 0xFF, 0xFF, 0xFF, // tracking error -1
            0x10, 0x75, // error code 0x7510
        ];
        let img = InputImage::new(&bytes).unwrap();
        assert_eq!(img.status_word().bits(), 0x0237);
        assert_eq!(img.actual_position(), 10_000);
        assert_eq!(img.tracking_error(), -1);
        assert_eq!(img.error_code(), 0x7510);
    }

    #[test]
    fn output_fields_encode_little_endian() {
        let mut bytes = [0u8; OUTPUTS_LEN];
        {
            let mut img = OutputImage::new(&mut bytes).unwrap();
            img.set_control_word(ControlWord::from_raw(0x001F));
            img.set_target_position(-200_000);
        }
        assert_eq!(bytes[0..2], [0x1F, 0x00]);
        assert_eq!(bytes[2..6], (-200_000i32).to_le_bytes());
    }

    #[test]
    fn short_regions_are_rejected() {
        let bytes = [0u8; INPUTS_LEN - 1];
        assert!(matches!(
            InputImage::new(&bytes),
            Err(ImageError::OutOfBounds { available: 11, .. })
        ));
        let mut bytes = [0u8; OUTPUTS_LEN - 1];
        assert!(OutputImage::new(&mut bytes).is_err());
    }

    #[test]
    fn view_ignores_trailing_bytes() {
        let mut bytes = [0xAAu8; 16];
        let img = OutputImage::new(&mut bytes).unwrap();
        assert_eq!(img.target_position(), i32::from_le_bytes([0xAA; 4]));
        drop(img);
        // Bytes past the region are untouched by writes.
        let mut img = OutputImage::new(&mut bytes).unwrap();
        img.set_target_position(0);
        assert_eq!(bytes[6..], [0xAA; 10]);
    }

    #[test]
    fn checked_accessors_report_bounds() {
        let buf = [0u8; 4];
        assert!(read_u16(&buf, 2).is_ok());
        assert_eq!(
            read_u16(&buf, 3),
            Err(ImageError::OutOfBounds {
                offset: 3,
                len: 2,
                available: 4
            })
        );
        assert!(read_i32(&buf, usize::MAX).is_err());

        let mut buf = [0u8; 4];
        assert!(write_i32(&mut buf, 1, 5).is_err());
        write_i32(&mut buf, 0, 5).unwrap();
        assert_eq!(read_i32(&buf, 0), Ok(5));
    }

    #[test]
    fn snapshots_match_views() {
        let inputs = DriveInputs {
            status_word: 0x0627,
            actual_position: -42,
            tracking_error: 17,
            error_code: 0,
        };
        let mut buf = [0u8; INPUTS_LEN];
        inputs.encode(&mut buf).unwrap();
        assert_eq!(InputImage::new(&buf).unwrap().snapshot(), inputs);

        let mut out = [0u8; OUTPUTS_LEN];
        {
            let mut img = OutputImage::new(&mut out).unwrap();
            img.set_control_word(ControlWord::CMD_SWITCH_ON);
            img.set_target_position(123);
        }
        let decoded = DriveOutputs::decode(&out).unwrap();
        assert_eq!(decoded.control_word, 0x0007);
        assert_eq!(decoded.target_position, 123);
    }
}
