//! LEB128 varints, unsigned and zigzag-signed.

use crate::error::{PartError, Result};

/// Appends `value` as an unsigned LEB128 varint.
#[inline]
pub fn marshal_uvarint(dst: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        dst.push((value as u8) | 0x80);
        value >>= 7;
    }
    dst.push(value as u8);
}

/// Reads an unsigned varint, returning it with the unread tail.
pub fn unmarshal_uvarint(src: &[u8]) -> Result<(u64, &[u8])> {
    let mut value = 0u64;
    let mut shift = 0u32;

    for (i, &b) in src.iter().enumerate() {
        if shift >= 64 || (shift == 63 && b > 1) {
            return Err(PartError::VarintOverflow);
        }
        value |= u64::from(b & 0x7f) << shift;
        if b < 0x80 {
            return Ok((value, &src[i + 1..]));
        }
        shift += 7;
    }

    Err(PartError::truncated("varint", src.len() + 1, src.len()))
}

/// Appends `value` as a zigzag-encoded varint.
#[inline]
pub fn marshal_varint(dst: &mut Vec<u8>, value: i64) {
    marshal_uvarint(dst, ((value << 1) ^ (value >> 63)) as u64);
}

/// Reads a zigzag-encoded varint.
pub fn unmarshal_varint(src: &[u8]) -> Result<(i64, &[u8])> {
    let (u, tail) = unmarshal_uvarint(src)?;
    Ok((((u >> 1) as i64) ^ -((u & 1) as i64), tail))
}
