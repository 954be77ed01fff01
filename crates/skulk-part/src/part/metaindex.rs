//! Metaindex: the directory of index blocks.
//!
//! Metric block headers are written back to back into the index buffer and
//! grouped into index blocks of bounded size. Each index block gets one
//! [`MetaindexRow`] recording where it lives, what it covers and its CRC32.

use crate::block::{BlockHeader, BLOCK_HEADER_SIZE};
use crate::buffer::{ByteBuffer, SliceReader};
use crate::error::{PartError, Result};
use crate::model::Tsid;
use crc32fast::Hasher;

/// Marshaled metaindex row size in bytes.
pub const METAINDEX_ROW_SIZE: usize = 60;

/// Directory entry for one index block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaindexRow {
    /// Series of the first block header in the index block.
    pub tsid: Tsid,
    /// Block headers in the index block.
    pub block_headers_count: u32,
    /// Smallest timestamp covered.
    pub min_timestamp: i64,
    /// Largest timestamp covered.
    pub max_timestamp: i64,
    /// Start of the index block within the index buffer.
    pub index_block_offset: u64,
    /// Index block length in bytes.
    pub index_block_size: u32,
    /// CRC32 of the index block bytes.
    pub index_block_crc32: u32,
}

impl MetaindexRow {
    /// Appends the row using little-endian byte order.
    pub fn marshal(&self, dst: &mut Vec<u8>) {
        // Tsid (24 bytes)
        self.tsid.marshal(dst);
        // Block headers count (4 bytes)
        dst.extend_from_slice(&self.block_headers_count.to_le_bytes());
        // Min timestamp (8 bytes)
        dst.extend_from_slice(&self.min_timestamp.to_le_bytes());
        // Max timestamp (8 bytes)
        dst.extend_from_slice(&self.max_timestamp.to_le_bytes());
        // Index block offset (8 bytes)
        dst.extend_from_slice(&self.index_block_offset.to_le_bytes());
        // Index block size (4 bytes)
        dst.extend_from_slice(&self.index_block_size.to_le_bytes());
        // Index block CRC32 (4 bytes)
        dst.extend_from_slice(&self.index_block_crc32.to_le_bytes());
    }

    /// Reads a row, returning it with the unread tail.
    pub fn unmarshal(src: &[u8]) -> Result<(Self, &[u8])> {
        let mut r = SliceReader::new(src, "metaindex row");
        r.require(METAINDEX_ROW_SIZE)?;
        let row = Self {
            tsid: Tsid::read(&mut r)?,
            block_headers_count: r.read_u32()?,
            min_timestamp: r.read_i64()?,
            max_timestamp: r.read_i64()?,
            index_block_offset: r.read_u64()?,
            index_block_size: r.read_u32()?,
            index_block_crc32: r.read_u32()?,
        };
        Ok((row, r.remaining()))
    }

    /// Reads every row of a metaindex buffer.
    pub fn unmarshal_all(mut src: &[u8]) -> Result<Vec<Self>> {
        if src.len() % METAINDEX_ROW_SIZE != 0 {
            return Err(PartError::Corrupted(format!(
                "metaindex length {} is not a multiple of {}",
                src.len(),
                METAINDEX_ROW_SIZE
            )));
        }
        let mut rows = Vec::with_capacity(src.len() / METAINDEX_ROW_SIZE);
        while !src.is_empty() {
            let (row, tail) = Self::unmarshal(src)?;
            if row.block_headers_count == 0 {
                return Err(PartError::Corrupted(
                    "metaindex row describes an empty index block".to_string(),
                ));
            }
            rows.push(row);
            src = tail;
        }
        Ok(rows)
    }

    /// Returns this row's index block, verifying its length and checksum.
    ///
    /// # Errors
    ///
    /// Returns `PartError::Truncated` if the block lies outside `index` and
    /// `PartError::ChecksumMismatch` if the CRC32 differs.
    pub fn index_block<'a>(&self, index: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.index_block_offset as usize;
        let end = start.saturating_add(self.index_block_size as usize);
        if end > index.len() {
            return Err(PartError::truncated("index block", end, index.len()));
        }
        let block = &index[start..end];

        let mut hasher = Hasher::new();
        hasher.update(block);
        let actual = hasher.finalize();
        if actual != self.index_block_crc32 {
            return Err(PartError::ChecksumMismatch {
                expected: self.index_block_crc32,
                actual,
            });
        }
        Ok(block)
    }
}

/// Writes metric block headers into the index and builds the metaindex.
///
/// An index block is closed before a header that would push it past the
/// configured size, so every index block holds at least one header.
pub struct IndexWriter<'a> {
    index: &'a mut ByteBuffer,
    metaindex: &'a mut ByteBuffer,
    index_block_size: usize,
    current: Option<MetaindexRow>,
    hasher: Hasher,
    buf: Vec<u8>,
    index_blocks: u64,
}

impl<'a> IndexWriter<'a> {
    /// Creates a writer appending to `index` and `metaindex`.
    pub fn new(
        index: &'a mut ByteBuffer,
        metaindex: &'a mut ByteBuffer,
        index_block_size: usize,
    ) -> Self {
        Self {
            index,
            metaindex,
            index_block_size,
            current: None,
            hasher: Hasher::new(),
            buf: Vec::with_capacity(METAINDEX_ROW_SIZE.max(BLOCK_HEADER_SIZE)),
            index_blocks: 0,
        }
    }

    /// Appends one block header.
    pub fn add(&mut self, header: &BlockHeader) {
        let full = self.current.map_or(false, |row| {
            row.index_block_size as usize + BLOCK_HEADER_SIZE > self.index_block_size
        });
        if full {
            self.flush_index_block();
        }

        self.buf.clear();
        header.marshal(&mut self.buf);
        let offset = self.index.append(&self.buf);
        self.hasher.update(&self.buf);

        let row = self.current.get_or_insert(MetaindexRow {
            tsid: header.tsid,
            block_headers_count: 0,
            min_timestamp: header.min_timestamp,
            max_timestamp: header.max_timestamp,
            index_block_offset: offset,
            index_block_size: 0,
            index_block_crc32: 0,
        });
        row.block_headers_count += 1;
        row.min_timestamp = row.min_timestamp.min(header.min_timestamp);
        row.max_timestamp = row.max_timestamp.max(header.max_timestamp);
        row.index_block_size += BLOCK_HEADER_SIZE as u32;
    }

    /// Closes the open index block and returns the number of index blocks
    /// written.
    pub fn finish(mut self) -> u64 {
        self.flush_index_block();
        self.index_blocks
    }

    fn flush_index_block(&mut self) {
        let Some(mut row) = self.current.take() else {
            return;
        };
        let hasher = std::mem::replace(&mut self.hasher, Hasher::new());
        row.index_block_crc32 = hasher.finalize();

        self.buf.clear();
        row.marshal(&mut self.buf);
        self.metaindex.append(&self.buf);
        self.index_blocks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(metric_id: u64, min_timestamp: i64, max_timestamp: i64) -> BlockHeader {
        BlockHeader {
            tsid: Tsid::from_metric_id(metric_id),
            min_timestamp,
            max_timestamp,
            rows_count: 1,
            ..BlockHeader::default()
        }
    }

    #[test]
    fn test_metaindex_row_size() {
        let row = MetaindexRow {
            tsid: Tsid::from_metric_id(3),
            block_headers_count: 2,
            min_timestamp: 1,
            max_timestamp: 2,
            index_block_offset: 0,
            index_block_size: 186,
            index_block_crc32: 0xdead_beef,
        };
        let mut buf = Vec::new();
        row.marshal(&mut buf);
        assert_eq!(buf.len(), METAINDEX_ROW_SIZE);
        assert_eq!(MetaindexRow::unmarshal_all(&buf).unwrap(), vec![row]);
    }

    #[test]
    fn test_single_index_block() {
        let mut index = ByteBuffer::new();
        let mut metaindex = ByteBuffer::new();
        let mut writer = IndexWriter::new(&mut index, &mut metaindex, 64 * 1024);
        writer.add(&header(1, 10, 20));
        writer.add(&header(2, 5, 30));
        assert_eq!(writer.finish(), 1);

        let rows = MetaindexRow::unmarshal_all(metaindex.as_slice()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tsid, Tsid::from_metric_id(1));
        assert_eq!(rows[0].block_headers_count, 2);
        assert_eq!(rows[0].min_timestamp, 5);
        assert_eq!(rows[0].max_timestamp, 30);
        assert_eq!(rows[0].index_block_size as usize, 2 * BLOCK_HEADER_SIZE);

        let block = rows[0].index_block(index.as_slice()).unwrap();
        assert_eq!(block.len(), index.len());
    }

    #[test]
    fn test_index_blocks_split_by_size() {
        let mut index = ByteBuffer::new();
        let mut metaindex = ByteBuffer::new();
        let mut writer = IndexWriter::new(&mut index, &mut metaindex, 2 * BLOCK_HEADER_SIZE);
        for i in 0..5 {
            writer.add(&header(i, i as i64, i as i64));
        }
        assert_eq!(writer.finish(), 3);

        let rows = MetaindexRow::unmarshal_all(metaindex.as_slice()).unwrap();
        let counts: Vec<u32> = rows.iter().map(|r| r.block_headers_count).collect();
        assert_eq!(counts, vec![2, 2, 1]);
        assert_eq!(rows[1].index_block_offset as usize, 2 * BLOCK_HEADER_SIZE);
        assert_eq!(rows[2].tsid, Tsid::from_metric_id(4));
        for row in &rows {
            row.index_block(index.as_slice()).unwrap();
        }
    }

    #[test]
    fn test_tiny_index_block_size_holds_one_header() {
        let mut index = ByteBuffer::new();
        let mut metaindex = ByteBuffer::new();
        let mut writer = IndexWriter::new(&mut index, &mut metaindex, 1);
        writer.add(&header(1, 0, 0));
        writer.add(&header(2, 0, 0));
        assert_eq!(writer.finish(), 2);
    }

    #[test]
    fn test_no_headers_no_metaindex() {
        let mut index = ByteBuffer::new();
        let mut metaindex = ByteBuffer::new();
        let writer = IndexWriter::new(&mut index, &mut metaindex, 1024);
        assert_eq!(writer.finish(), 0);
        assert!(metaindex.is_empty());
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut index = ByteBuffer::new();
        let mut metaindex = ByteBuffer::new();
        let mut writer = IndexWriter::new(&mut index, &mut metaindex, 1024);
        writer.add(&header(1, 0, 0));
        writer.finish();

        let rows = MetaindexRow::unmarshal_all(metaindex.as_slice()).unwrap();
        let mut corrupted = index.as_slice().to_vec();
        corrupted[0] ^= 0xff;
        assert!(matches!(
            rows[0].index_block(&corrupted),
            Err(PartError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_metaindex_length_must_align() {
        assert!(matches!(
            MetaindexRow::unmarshal_all(&[0u8; 59]),
            Err(PartError::Corrupted(_))
        ));
    }
}
