//! EBML variable-size integer parsing over byte slices.
//!
//! All readers are resumable: they return `Ok(None)` when the slice does not
//! yet contain the complete field, so the incremental cluster walker can ask
//! the caller for more bytes without losing position.
//!
//! EBML uses a leading-1 encoding for variable-size integers:
//! - 1 byte:  `1xxx xxxx`           (7 data bits)
//! - 2 bytes: `01xx xxxx xxxx xxxx` (14 data bits)
//! - 3 bytes: `001x xxxx ...`       (21 data bits)
//! - etc., up to 8 bytes for data sizes (4 for element IDs)

use crate::error::{Error, Result};

/// Parse an EBML element ID (1-4 bytes). The leading-1 marker stays in the
/// value, so the raw bytes form the ID directly.
pub(crate) fn parse_element_id(data: &[u8]) -> Result<Option<(u32, usize)>> {
    let Some(&first) = data.first() else {
        return Ok(None);
    };
    let width = (first.leading_zeros() + 1) as usize;
    if width > 4 {
        return Err(Error::invalid_cluster(format!(
            "invalid element ID leading byte 0x{first:02X}"
        )));
    }
    if data.len() < width {
        return Ok(None);
    }

    let mut id = 0u32;
    for &byte in &data[..width] {
        id = (id << 8) | byte as u32;
    }
    Ok(Some((id, width)))
}

/// Parse an EBML data size (1-8 bytes). The leading-1 marker is stripped.
///
/// Returns `(None, width)` for the all-ones "unknown size" sentinel.
pub(crate) fn parse_element_size(data: &[u8]) -> Result<Option<(Option<u64>, usize)>> {
    let Some(&first) = data.first() else {
        return Ok(None);
    };
    let width = (first.leading_zeros() + 1) as usize;
    if width > 8 {
        return Err(Error::invalid_cluster(format!(
            "invalid size leading byte 0x{first:02X}"
        )));
    }
    if data.len() < width {
        return Ok(None);
    }

    // Widened so the shift stays in range for the full 8-byte form, where
    // the marker bit occupies the whole leading byte.
    let mask = (0xFFu16 >> width) as u8;
    let mut value = (first & mask) as u64;
    for &byte in &data[1..width] {
        value = (value << 8) | byte as u64;
    }

    let all_ones = (1u64 << (7 * width)) - 1;
    if value == all_ones {
        return Ok(Some((None, width)));
    }
    Ok(Some((Some(value), width)))
}

/// Parse the track-number vint at the start of a block body. Same encoding
/// as a data size (marker stripped) but limited to 4 bytes, and the unknown
/// sentinel is not allowed.
pub(crate) fn parse_block_vint(data: &[u8]) -> Result<Option<(u64, usize)>> {
    let Some(&first) = data.first() else {
        return Ok(None);
    };
    let width = (first.leading_zeros() + 1) as usize;
    if width > 4 {
        return Err(Error::invalid_block(format!(
            "invalid track vint leading byte 0x{first:02X}"
        )));
    }
    if data.len() < width {
        return Ok(None);
    }

    let mask = 0xFFu8 >> width;
    let mut value = (first & mask) as u64;
    for &byte in &data[1..width] {
        value = (value << 8) | byte as u64;
    }
    Ok(Some((value, width)))
}

/// Decode a whole unsigned-integer element body (1-8 bytes, big-endian).
pub(crate) fn read_uint(data: &[u8]) -> Result<u64> {
    if data.is_empty() || data.len() > 8 {
        return Err(Error::invalid_cluster(format!(
            "invalid uint element size {}",
            data.len()
        )));
    }
    let mut value = 0u64;
    for &byte in data {
        value = (value << 8) | byte as u64;
    }
    Ok(value)
}

/// Decode a whole signed-integer element body (1-8 bytes, big-endian,
/// two's complement).
pub(crate) fn read_sint(data: &[u8]) -> Result<i64> {
    if data.is_empty() || data.len() > 8 {
        return Err(Error::invalid_cluster(format!(
            "invalid sint element size {}",
            data.len()
        )));
    }
    let mut value: i64 = if data[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in data {
        value = (value << 8) | byte as i64;
    }
    Ok(value)
}
