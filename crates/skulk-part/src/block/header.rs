//! Block header: the index entry describing one encoded block.

use crate::buffer::SliceReader;
use crate::config::MAX_ROWS_PER_BLOCK;
use crate::encoding::MarshalType;
use std::ops::Range;
use crate::error::{PartError, Result};
use crate::model::Tsid;

/// Marshaled block header size in bytes.
pub const BLOCK_HEADER_SIZE: usize = 101;

/// Index entry locating and describing one block.
///
/// Offsets point into the payload blob of the owning part: the values and
/// timestamps buffers for metric blocks, the exemplars buffer for exemplar
/// blocks. Metric blocks carry no tags, so their `tags_offset` and
/// `tags_size` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Series of every row in the block.
    pub tsid: Tsid,
    /// Start of the marshaled timestamps.
    pub timestamps_offset: u64,
    /// Start of the marshaled values.
    pub values_offset: u64,
    /// Start of the concatenated tag sets.
    pub tags_offset: u64,
    /// First decimal mantissa of the values stream.
    pub first_value: i64,
    /// Smallest timestamp of the block.
    pub min_timestamp: i64,
    /// Power-of-ten exponent shared by the block's mantissas.
    pub scale: i16,
    /// Precision bits used for the values stream.
    pub precision_bits: u8,
    /// Encoding of the values stream.
    pub values_marshal_type: MarshalType,
    /// Encoding of the timestamps stream.
    pub timestamps_marshal_type: MarshalType,
    /// Rows in the block.
    pub rows_count: u32,
    /// Largest timestamp of the block.
    pub max_timestamp: i64,
    /// Bytes of the marshaled timestamps.
    pub timestamps_size: u32,
    /// Bytes of the marshaled values.
    pub values_size: u32,
    /// Bytes of the tag sets.
    pub tags_size: u32,
    /// First timestamp of the block, the anchor of the timestamps stream.
    /// Equals `min_timestamp` when the rows are ordered by time.
    pub first_timestamp: i64,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            tsid: Tsid::default(),
            timestamps_offset: 0,
            values_offset: 0,
            tags_offset: 0,
            first_value: 0,
            min_timestamp: 0,
            scale: 0,
            precision_bits: 0,
            values_marshal_type: MarshalType::Const,
            timestamps_marshal_type: MarshalType::Const,
            rows_count: 0,
            max_timestamp: 0,
            timestamps_size: 0,
            values_size: 0,
            tags_size: 0,
            first_timestamp: 0,
        }
    }
}

impl BlockHeader {
    /// Appends the header using little-endian byte order.
    pub fn marshal(&self, dst: &mut Vec<u8>) {
        dst.reserve(BLOCK_HEADER_SIZE);
        // Tsid (24 bytes)
        self.tsid.marshal(dst);
        // Timestamps offset (8 bytes)
        dst.extend_from_slice(&self.timestamps_offset.to_le_bytes());
        // Values offset (8 bytes)
        dst.extend_from_slice(&self.values_offset.to_le_bytes());
        // Tags offset (8 bytes)
        dst.extend_from_slice(&self.tags_offset.to_le_bytes());
        // First value (8 bytes)
        dst.extend_from_slice(&self.first_value.to_le_bytes());
        // Min timestamp (8 bytes)
        dst.extend_from_slice(&self.min_timestamp.to_le_bytes());
        // Scale (2 bytes)
        dst.extend_from_slice(&self.scale.to_le_bytes());
        // Precision bits (1 byte)
        dst.push(self.precision_bits);
        // Values marshal type (1 byte)
        dst.push(self.values_marshal_type.as_u8());
        // Timestamps marshal type (1 byte)
        dst.push(self.timestamps_marshal_type.as_u8());
        // Rows count (4 bytes)
        dst.extend_from_slice(&self.rows_count.to_le_bytes());
        // Max timestamp (8 bytes)
        dst.extend_from_slice(&self.max_timestamp.to_le_bytes());
        // Timestamps size (4 bytes)
        dst.extend_from_slice(&self.timestamps_size.to_le_bytes());
        // Values size (4 bytes)
        dst.extend_from_slice(&self.values_size.to_le_bytes());
        // Tags size (4 bytes)
        dst.extend_from_slice(&self.tags_size.to_le_bytes());
        // First timestamp (8 bytes)
        dst.extend_from_slice(&self.first_timestamp.to_le_bytes());
    }

    /// Reads a header, returning it with the unread tail.
    ///
    /// # Errors
    ///
    /// Returns `PartError::Truncated` if fewer than [`BLOCK_HEADER_SIZE`]
    /// bytes are available, `PartError::InvalidMarshalType` for an unknown
    /// stream encoding and `PartError::Corrupted` for a row count outside
    /// `1..=MAX_ROWS_PER_BLOCK`.
    pub fn unmarshal(src: &[u8]) -> Result<(Self, &[u8])> {
        let mut r = SliceReader::new(src, "block header");
        r.require(BLOCK_HEADER_SIZE)?;

        let tsid = Tsid::read(&mut r)?;
        let timestamps_offset = r.read_u64()?;
        let values_offset = r.read_u64()?;
        let tags_offset = r.read_u64()?;
        let first_value = r.read_i64()?;
        let min_timestamp = r.read_i64()?;
        let scale = r.read_i16()?;
        let precision_bits = r.read_u8()?;
        let values_marshal_type = read_marshal_type(&mut r)?;
        let timestamps_marshal_type = read_marshal_type(&mut r)?;
        let rows_count = r.read_u32()?;
        let max_timestamp = r.read_i64()?;
        let timestamps_size = r.read_u32()?;
        let values_size = r.read_u32()?;
        let tags_size = r.read_u32()?;
        let first_timestamp = r.read_i64()?;

        if rows_count == 0 || rows_count as usize > MAX_ROWS_PER_BLOCK {
            return Err(PartError::Corrupted(format!(
                "block header for {:?} has {} rows",
                tsid, rows_count
            )));
        }

        let header = Self {
            tsid,
            timestamps_offset,
            values_offset,
            tags_offset,
            first_value,
            min_timestamp,
            scale,
            precision_bits,
            values_marshal_type,
            timestamps_marshal_type,
            rows_count,
            max_timestamp,
            timestamps_size,
            values_size,
            tags_size,
            first_timestamp,
        };
        Ok((header, r.remaining()))
    }

    /// Byte range of the marshaled values within the payload blob.
    ///
    /// # Errors
    ///
    /// Returns `PartError::Corrupted` if the segment end overflows `usize`.
    pub fn values_range(&self) -> Result<Range<usize>> {
        segment(self.values_offset, self.values_size, "values segment")
    }

    /// Byte range of the marshaled timestamps within the payload blob.
    pub fn timestamps_range(&self) -> Result<Range<usize>> {
        segment(self.timestamps_offset, self.timestamps_size, "timestamps segment")
    }

    /// Byte range of the tag sets within the exemplars blob.
    pub fn tags_range(&self) -> Result<Range<usize>> {
        segment(self.tags_offset, self.tags_size, "tags segment")
    }
}

fn read_marshal_type(r: &mut SliceReader<'_>) -> Result<MarshalType> {
    let code = r.read_u8()?;
    MarshalType::from_u8(code).ok_or(PartError::InvalidMarshalType(code))
}

fn segment(offset: u64, size: u32, what: &str) -> Result<Range<usize>> {
    usize::try_from(offset)
        .ok()
        .and_then(|start| Some(start..start.checked_add(size as usize)?))
        .ok_or_else(|| {
            PartError::Corrupted(format!("{} at {} (+{}) overflows", what, offset, size))
        })
}
