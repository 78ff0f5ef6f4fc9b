//! Length-encoded integers and strings
//!
//! The first byte selects the width: values below 0xFB are the integer
//! itself, 0xFC/0xFD/0xFE are followed by 2, 3 or 8 little-endian bytes.
//! 0xFB is the NULL marker in row data and 0xFF starts an ERR packet, so
//! neither can start an integer.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LenencError {
    #[error("Not enough bytes for length-encoded value: need {needed}")]
    Incomplete { needed: usize },
    #[error("Invalid length-encoded integer marker 0x{0:02x}")]
    InvalidMarker(u8),
}

/// Total width (marker + value bytes) announced by the first byte
pub fn lenenc_int_width(first: u8) -> Result<usize, LenencError> {
    match first {
        0x00..=0xFA => Ok(1),
        0xFC => Ok(3),
        0xFD => Ok(4),
        0xFE => Ok(9),
        other => Err(LenencError::InvalidMarker(other)),
    }
}

/// Decode a length-encoded integer, returning (value, bytes consumed)
pub fn read_lenenc_int(buf: &[u8]) -> Result<(u64, usize), LenencError> {
    let first = *buf.first().ok_or(LenencError::Incomplete { needed: 1 })?;
    let width = lenenc_int_width(first)?;

    if buf.len() < width {
        return Err(LenencError::Incomplete { needed: width });
    }

    if width == 1 {
        return Ok((first as u64, 1));
    }

    let mut value = [0u8; 8];
    value[..width - 1].copy_from_slice(&buf[1..width]);
    Ok((u64::from_le_bytes(value), width))
}

/// Decode a length-encoded string as a borrowed view, returning (bytes, consumed)
#[allow(dead_code)]
pub fn read_lenenc_str(buf: &[u8]) -> Result<(&[u8], usize), LenencError> {
    let (len, width) = read_lenenc_int(buf)?;
    let total = usize::try_from(len)
        .ok()
        .and_then(|len| len.checked_add(width))
        .ok_or(LenencError::Incomplete { needed: usize::MAX })?;

    if buf.len() < total {
        return Err(LenencError::Incomplete { needed: total });
    }

    Ok((&buf[width..total], total))
}

/// Encode a length-encoded integer
pub fn write_lenenc_int(buf: &mut BytesMut, value: u64) {
    if value < 251 {
        buf.put_u8(value as u8);
    } else if value < 65536 {
        buf.put_u8(0xFC);
        buf.put_u16_le(value as u16);
    } else if value < 16777216 {
        buf.put_u8(0xFD);
        buf.put_u8((value & 0xFF) as u8);
        buf.put_u8(((value >> 8) & 0xFF) as u8);
        buf.put_u8(((value >> 16) & 0xFF) as u8);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(value);
    }
}
