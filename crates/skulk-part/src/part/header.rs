//! Part header.

use crate::buffer::SliceReader;
use crate::error::Result;

/// Marshaled part header size in bytes.
pub const PART_HEADER_SIZE: usize = 48;

/// Summary statistics of a part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartHeader {
    /// Metric rows in the part.
    pub rows_count: u64,
    /// Metric blocks in the part.
    pub blocks_count: u64,
    /// Exemplars in the part.
    pub exemplars_count: u64,
    /// Exemplar blocks in the part.
    pub exemplar_blocks_count: u64,
    /// Smallest metric timestamp.
    pub min_timestamp: i64,
    /// Largest metric timestamp.
    pub max_timestamp: i64,
}

impl PartHeader {
    /// Appends the header using little-endian byte order.
    pub fn marshal(&self, dst: &mut Vec<u8>) {
        // Rows count (8 bytes)
        dst.extend_from_slice(&self.rows_count.to_le_bytes());
        // Blocks count (8 bytes)
        dst.extend_from_slice(&self.blocks_count.to_le_bytes());
        // Exemplars count (8 bytes)
        dst.extend_from_slice(&self.exemplars_count.to_le_bytes());
        // Exemplar blocks count (8 bytes)
        dst.extend_from_slice(&self.exemplar_blocks_count.to_le_bytes());
        // Min timestamp (8 bytes)
        dst.extend_from_slice(&self.min_timestamp.to_le_bytes());
        // Max timestamp (8 bytes)
        dst.extend_from_slice(&self.max_timestamp.to_le_bytes());
    }

    /// Reads a header, returning it with the unread tail.
    pub fn unmarshal(src: &[u8]) -> Result<(Self, &[u8])> {
        let mut r = SliceReader::new(src, "part header");
        r.require(PART_HEADER_SIZE)?;
        let header = Self {
            rows_count: r.read_u64()?,
            blocks_count: r.read_u64()?,
            exemplars_count: r.read_u64()?,
            exemplar_blocks_count: r.read_u64()?,
            min_timestamp: r.read_i64()?,
            max_timestamp: r.read_i64()?,
        };
        Ok((header, r.remaining()))
    }
}
