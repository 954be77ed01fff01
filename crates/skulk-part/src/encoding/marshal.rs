//! Adaptive int64 stream encoding.
//!
//! A stream is described by a [`MarshalType`], its first value (stored by the
//! caller, usually in a block header) and the encoded bytes:
//!
//! | Type | Payload |
//! |---|---|
//! | `Const` | empty; every item equals the first value |
//! | `DeltaConst` | one zigzag varint: the constant delta |
//! | `NearestDelta` | zigzag varint per delta (gauges) |
//! | `NearestDelta2` | first delta, then zigzag varint delta-of-deltas (counters, timestamps) |
//! | `Zstd*` | the nearest-delta payload compressed with zstd |
//!
//! Nearest-delta encodings keep `precision_bits` significant bits of every
//! item. Each delta is rounded to the bit width of the item it reconstructs,
//! measured against the reconstructed previous item, so the error of an item
//! is bounded by its own magnitude and never accumulates along the stream.
//! With 64 precision bits the encoding is lossless.

use crate::config::MAX_ROWS_PER_BLOCK;
use crate::encoding::decimal::is_special;
use crate::encoding::varint::{marshal_varint, unmarshal_varint};
use crate::error::{PartError, Result};
use tracing::debug;

/// Payloads at least this long go through the zstd stage.
pub const MIN_COMPRESSIBLE_BLOCK_SIZE: usize = 128;

/// Precision bits that keep an encoding lossless.
pub const LOSSLESS_PRECISION_BITS: u8 = 64;

/// Encoding strategy applied to an int64 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MarshalType {
    /// Zstd-compressed `NearestDelta2`.
    ZstdNearestDelta2 = 1,
    /// Constant delta between consecutive items.
    DeltaConst = 2,
    /// All items equal.
    Const = 3,
    /// Zstd-compressed `NearestDelta`.
    ZstdNearestDelta = 4,
    /// Delta-of-delta encoding.
    NearestDelta2 = 5,
    /// Delta encoding.
    NearestDelta = 6,
}

impl MarshalType {
    /// Creates a MarshalType from a u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ZstdNearestDelta2),
            2 => Some(Self::DeltaConst),
            3 => Some(Self::Const),
            4 => Some(Self::ZstdNearestDelta),
            5 => Some(Self::NearestDelta2),
            6 => Some(Self::NearestDelta),
            _ => None,
        }
    }

    /// Returns the raw u8 value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns true if the payload carries a zstd stage.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::ZstdNearestDelta | Self::ZstdNearestDelta2)
    }

    fn compressed(self) -> Self {
        match self {
            Self::NearestDelta => Self::ZstdNearestDelta,
            Self::NearestDelta2 => Self::ZstdNearestDelta2,
            other => other,
        }
    }
}

/// Marshals the decimal mantissas of a block.
///
/// Returns the marshal type and the first value, which the caller must keep.
pub fn marshal_values(dst: &mut Vec<u8>, values: &[i64], precision_bits: u8) -> (MarshalType, i64) {
    marshal_int64s(dst, values, precision_bits)
}

/// Marshals the timestamps of a block.
///
/// The returned anchor is the first timestamp, which is the block minimum
/// only for ascending input.
pub fn marshal_timestamps(
    dst: &mut Vec<u8>,
    timestamps: &[i64],
    precision_bits: u8,
) -> (MarshalType, i64) {
    marshal_int64s(dst, timestamps, precision_bits)
}

/// Appends the encoding of `src` to `dst`, choosing the cheapest strategy.
///
/// # Panics
///
/// Panics if `src` is empty.
pub fn marshal_int64s(dst: &mut Vec<u8>, src: &[i64], precision_bits: u8) -> (MarshalType, i64) {
    assert!(!src.is_empty(), "BUG: marshal_int64s called with an empty stream");

    let first = src[0];
    if is_const(src) {
        return (MarshalType::Const, first);
    }
    if is_delta_const(src) {
        marshal_varint(dst, src[1].wrapping_sub(src[0]));
        return (MarshalType::DeltaConst, first);
    }

    // Lossy rounding would corrupt non-finite sentinels.
    let precision_bits = if src.iter().any(|&v| is_special(v)) {
        LOSSLESS_PRECISION_BITS
    } else {
        precision_bits.clamp(1, LOSSLESS_PRECISION_BITS)
    };

    let start = dst.len();
    let mt = if is_monotonic(src) {
        marshal_nearest_delta2(dst, src, precision_bits);
        MarshalType::NearestDelta2
    } else {
        marshal_nearest_delta(dst, src, precision_bits);
        MarshalType::NearestDelta
    };

    let encoded_len = dst.len() - start;
    if encoded_len < MIN_COMPRESSIBLE_BLOCK_SIZE {
        return (mt, first);
    }

    match zstd::encode_all(&dst[start..], compression_level(src.len())) {
        Ok(compressed) if compressed.len() < encoded_len => {
            dst.truncate(start);
            dst.extend_from_slice(&compressed);
            (mt.compressed(), first)
        }
        Ok(_) => (mt, first),
        Err(e) => {
            debug!("zstd stage skipped for {} items: {}", src.len(), e);
            (mt, first)
        }
    }
}

/// Appends `count` items decoded from `src` to `dst`.
///
/// At most [`MAX_ROWS_PER_BLOCK`] items are reserved up front, so a corrupted
/// count fails on the payload instead of on the allocation.
pub fn unmarshal_int64s(
    dst: &mut Vec<i64>,
    src: &[u8],
    mt: MarshalType,
    first: i64,
    count: usize,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    dst.reserve(count.min(MAX_ROWS_PER_BLOCK));

    match mt {
        MarshalType::Const => {
            if !src.is_empty() {
                return Err(PartError::Corrupted(format!(
                    "const stream carries {} unexpected bytes",
                    src.len()
                )));
            }
            dst.extend(std::iter::repeat(first).take(count));
            Ok(())
        }
        MarshalType::DeltaConst => {
            let (delta, tail) = unmarshal_varint(src)?;
            if !tail.is_empty() {
                return Err(PartError::Corrupted(format!(
                    "delta-const stream carries {} trailing bytes",
                    tail.len()
                )));
            }
            let mut v = first;
            for _ in 0..count {
                dst.push(v);
                v = v.wrapping_add(delta);
            }
            Ok(())
        }
        MarshalType::NearestDelta => unmarshal_nearest_delta(dst, src, first, count),
        MarshalType::NearestDelta2 => unmarshal_nearest_delta2(dst, src, first, count),
        MarshalType::ZstdNearestDelta | MarshalType::ZstdNearestDelta2 => {
            let raw = zstd::decode_all(src).map_err(|e| PartError::Decompression {
                marshal_type: mt,
                reason: e.to_string(),
            })?;
            if mt == MarshalType::ZstdNearestDelta {
                unmarshal_nearest_delta(dst, &raw, first, count)
            } else {
                unmarshal_nearest_delta2(dst, &raw, first, count)
            }
        }
    }
}

fn is_const(a: &[i64]) -> bool {
    a.iter().all(|&v| v == a[0])
}

fn is_delta_const(a: &[i64]) -> bool {
    if a.len() < 2 {
        return false;
    }
    let delta = a[1].wrapping_sub(a[0]);
    a.windows(2).all(|w| w[1].wrapping_sub(w[0]) == delta)
}

fn is_monotonic(a: &[i64]) -> bool {
    a.windows(2).all(|w| w[1] >= w[0])
}

fn marshal_nearest_delta(dst: &mut Vec<u8>, a: &[i64], precision_bits: u8) {
    let mut prev = a[0];
    for &v in &a[1..] {
        let d = nearest_delta(v, prev, precision_bits);
        marshal_varint(dst, d);
        prev = prev.wrapping_add(d);
    }
}

fn marshal_nearest_delta2(dst: &mut Vec<u8>, a: &[i64], precision_bits: u8) {
    let mut prev = a[0];
    let mut prev_delta = 0i64;
    for (i, &v) in a[1..].iter().enumerate() {
        let d = nearest_delta(v, prev, precision_bits);
        if i == 0 {
            marshal_varint(dst, d);
        } else {
            marshal_varint(dst, d.wrapping_sub(prev_delta));
        }
        prev_delta = d;
        prev = prev.wrapping_add(d);
    }
}

fn unmarshal_nearest_delta(dst: &mut Vec<i64>, mut src: &[u8], first: i64, count: usize) -> Result<()> {
    let mut v = first;
    dst.push(v);
    for _ in 1..count {
        let (d, tail) = unmarshal_varint(src)?;
        src = tail;
        v = v.wrapping_add(d);
        dst.push(v);
    }
    ensure_consumed(src)
}

fn unmarshal_nearest_delta2(dst: &mut Vec<i64>, mut src: &[u8], first: i64, count: usize) -> Result<()> {
    let mut v = first;
    let mut delta = 0i64;
    dst.push(v);
    for i in 1..count {
        let (d, tail) = unmarshal_varint(src)?;
        src = tail;
        delta = if i == 1 { d } else { delta.wrapping_add(d) };
        v = v.wrapping_add(delta);
        dst.push(v);
    }
    ensure_consumed(src)
}

fn ensure_consumed(tail: &[u8]) -> Result<()> {
    if tail.is_empty() {
        Ok(())
    } else {
        Err(PartError::Corrupted(format!(
            "{} trailing bytes after stream",
            tail.len()
        )))
    }
}

/// Returns the delta from `prev` to `next`, rounded so that `prev + delta`
/// keeps the top `precision_bits` significant bits of `next`.
///
/// The rounding step is `2^(bits(next) - precision_bits)`, so the
/// reconstruction error is at most `|next| * 2^-precision_bits`.
fn nearest_delta(next: i64, prev: i64, precision_bits: u8) -> i64 {
    let d = next.wrapping_sub(prev);
    if precision_bits >= LOSSLESS_PRECISION_BITS {
        return d;
    }
    let bits = 64 - next.unsigned_abs().leading_zeros();
    if bits <= u32::from(precision_bits) {
        return d;
    }
    let shift = bits - u32::from(precision_bits);
    let step = 1i128 << shift;
    let exact = i128::from(next) - i128::from(prev);
    let rounded = (exact + step / 2).div_euclid(step) * step;
    let target = (i128::from(prev) + rounded).clamp(i128::from(i64::MIN), i128::from(i64::MAX));
    // The clamp only moves the target towards `next`, which is in range.
    (target as i64).wrapping_sub(prev)
}

/// Zstd level by stream length; short streams gain little from harder levels.
fn compression_level(items: usize) -> i32 {
    match items {
        0..=64 => 1,
        65..=256 => 2,
        257..=1024 => 3,
        1025..=4096 => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(src: &[i64], precision_bits: u8) -> (MarshalType, Vec<u8>, Vec<i64>) {
        let mut buf = Vec::new();
        let (mt, first) = marshal_int64s(&mut buf, src, precision_bits);
        let mut decoded = Vec::new();
        unmarshal_int64s(&mut decoded, &buf, mt, first, src.len()).unwrap();
        (mt, buf, decoded)
    }

    #[test]
    fn test_const_stream_has_empty_payload() {
        let (mt, buf, decoded) = roundtrip(&[7, 7, 7, 7], 64);
        assert_eq!(mt, MarshalType::Const);
        assert!(buf.is_empty());
        assert_eq!(decoded, vec![7, 7, 7, 7]);
    }

    #[test]
    fn test_single_item_is_const() {
        let (mt, buf, decoded) = roundtrip(&[-3], 64);
        assert_eq!(mt, MarshalType::Const);
        assert!(buf.is_empty());
        assert_eq!(decoded, vec![-3]);
    }

    #[test]
    fn test_delta_const_timestamps() {
        let ts: Vec<i64> = (0..100).map(|i| 1_700_000_000_000 + i * 15_000).collect();
        let (mt, buf, decoded) = roundtrip(&ts, 64);
        assert_eq!(mt, MarshalType::DeltaConst);
        assert_eq!(buf.len(), 3);
        assert_eq!(decoded, ts);
    }

    #[test]
    fn test_monotonic_uses_delta2() {
        let (mt, _, decoded) = roundtrip(&[10, 11, 13, 20, 20, 31], 64);
        assert_eq!(mt, MarshalType::NearestDelta2);
        assert_eq!(decoded, vec![10, 11, 13, 20, 20, 31]);
    }

    #[test]
    fn test_gauge_uses_delta() {
        let (mt, _, decoded) = roundtrip(&[5, -2, 9, 9, 0], 64);
        assert_eq!(mt, MarshalType::NearestDelta);
        assert_eq!(decoded, vec![5, -2, 9, 9, 0]);
    }

    #[test]
    fn test_large_gauge_gets_compressed() {
        let src: Vec<i64> = (0..4096).map(|i| if i % 2 == 0 { 1000 } else { -1000 }).collect();
        let (mt, buf, decoded) = roundtrip(&src, 64);
        assert_eq!(mt, MarshalType::ZstdNearestDelta);
        assert!(buf.len() < 4096);
        assert_eq!(decoded, src);
    }

    #[test]
    fn test_sentinels_survive_lossy_precision() {
        use crate::encoding::decimal::{V_INF_POS, V_NAN};
        let src = [1, V_NAN, 3, V_INF_POS, 2];
        let (_, _, decoded) = roundtrip(&src, 4);
        assert_eq!(decoded, src.to_vec());
    }

    /// Reconstruction error stays within `|v| * 2^-precision_bits` per item.
    fn assert_within_precision(src: &[i64], decoded: &[i64], precision_bits: u8) {
        for (&orig, &got) in src.iter().zip(decoded) {
            let err = (i128::from(orig) - i128::from(got)).unsigned_abs();
            let bound = u128::from(orig.unsigned_abs()) >> precision_bits;
            assert!(
                err <= bound,
                "{} decoded as {} with {} precision bits",
                orig,
                got,
                precision_bits
            );
        }
    }

    #[test]
    fn test_lossy_precision_bounds_error() {
        let src: Vec<i64> = (0..200).map(|i| ((i * 7919) % 1000) * 1_000_003).collect();
        let (_, _, decoded) = roundtrip(&src, 8);
        assert_within_precision(&src, &decoded, 8);
    }

    #[test]
    fn test_small_value_after_large_swing_is_exact() {
        let src = [1_000_000, -1_000_000, 1, 3, -2_000_000, 0];
        let (mt, _, decoded) = roundtrip(&src, 8);
        assert_eq!(mt, MarshalType::NearestDelta);
        assert_eq!(decoded[2..4], [1, 3]);
        assert_eq!(decoded[5], 0);
        assert_within_precision(&src, &decoded, 8);
    }

    #[test]
    fn test_lossy_counter_keeps_precision() {
        let src: Vec<i64> = (0..500).map(|i| i * i * 37 + (i % 3)).collect();
        let (mt, _, decoded) = roundtrip(&src, 6);
        assert!(matches!(mt, MarshalType::NearestDelta2 | MarshalType::ZstdNearestDelta2));
        assert_within_precision(&src, &decoded, 6);
    }

    #[test]
    fn test_lossy_extremes_stay_in_range() {
        let src = [i64::MAX - 1, i64::MIN + 2, i64::MAX - 3, 5];
        let (_, _, decoded) = roundtrip(&src, 3);
        assert_within_precision(&src, &decoded, 3);
        assert_eq!(decoded[3], 5);
    }

    #[test]
    fn test_unmarshal_huge_count_fails_without_allocating() {
        let mut dst = Vec::new();
        let result = unmarshal_int64s(&mut dst, &[2], MarshalType::NearestDelta, 0, usize::MAX);
        assert!(matches!(result, Err(PartError::Truncated { .. })));
        assert_eq!(dst, vec![0, 1]);
    }

    #[test]
    fn test_const_with_payload_is_corrupted() {
        let mut dst = Vec::new();
        let result = unmarshal_int64s(&mut dst, &[1], MarshalType::Const, 0, 3);
        assert!(matches!(result, Err(PartError::Corrupted(_))));
    }

    #[test]
    fn test_truncated_stream() {
        let mut dst = Vec::new();
        let result = unmarshal_int64s(&mut dst, &[], MarshalType::NearestDelta, 0, 3);
        assert!(matches!(result, Err(PartError::Truncated { .. })));
    }

    #[test]
    fn test_marshal_type_codes() {
        for code in 1..=6u8 {
            assert_eq!(MarshalType::from_u8(code).unwrap().as_u8(), code);
        }
        assert_eq!(MarshalType::from_u8(0), None);
        assert_eq!(MarshalType::from_u8(7), None);
    }

    #[test]
    #[should_panic(expected = "BUG")]
    fn test_empty_stream_panics() {
        let mut dst = Vec::new();
        marshal_int64s(&mut dst, &[], 64);
    }
}
