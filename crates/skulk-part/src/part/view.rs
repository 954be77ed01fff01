//! Immutable view over an encoded part.

use crate::block::BlockHeader;
use crate::buffer::SliceReader;
use crate::config::MAX_ROWS_PER_BLOCK;
use crate::encoding::{append_decimal_to_floats, unmarshal_int64s};
use crate::error::{PartError, Result};
use crate::model::{unmarshal_tag_set, Label, Tsid};
use crate::part::header::PartHeader;
use crate::part::metaindex::MetaindexRow;

/// Magic bytes opening a serialized part.
pub const PART_MAGIC: [u8; 4] = *b"SKPT";

/// Finalized part, borrowing its buffers.
///
/// Produced by [`InmemoryPart::new_part`](crate::part::InmemoryPart::new_part)
/// or parsed from the serialized form written by
/// [`InmemoryPart::must_write_to`](crate::part::InmemoryPart::must_write_to).
#[derive(Debug, Clone)]
pub struct Part<'a> {
    pub(crate) header: PartHeader,
    pub(crate) creation_time: u64,
    pub(crate) timestamps: &'a [u8],
    pub(crate) values: &'a [u8],
    pub(crate) index: &'a [u8],
    pub(crate) metaindex: &'a [u8],
    pub(crate) exemplars: &'a [u8],
    pub(crate) exemplars_index: &'a [u8],
    pub(crate) metaindex_rows: Vec<MetaindexRow>,
}

impl<'a> Part<'a> {
    /// Parses a serialized part.
    ///
    /// # Errors
    ///
    /// Returns `PartError::Corrupted` on a wrong magic or trailing bytes, and
    /// `PartError::Truncated` if a section is cut short.
    pub fn from_bytes(src: &'a [u8]) -> Result<Self> {
        let mut r = SliceReader::new(src, "part");
        let magic = r.read_bytes(PART_MAGIC.len())?;
        if magic != PART_MAGIC {
            return Err(PartError::Corrupted(format!("invalid part magic {:?}", magic)));
        }
        let (header, tail) = PartHeader::unmarshal(r.remaining())?;
        let mut r = SliceReader::new(tail, "part");
        let creation_time = r.read_u64()?;

        let mut section = || -> Result<&'a [u8]> {
            let len = r.read_u64()?;
            let len = usize::try_from(len).map_err(|_| {
                PartError::Corrupted(format!("section length {} overflows", len))
            })?;
            r.read_bytes(len)
        };
        let timestamps = section()?;
        let values = section()?;
        let index = section()?;
        let metaindex = section()?;
        let exemplars = section()?;
        let exemplars_index = section()?;
        drop(section);

        if !r.remaining().is_empty() {
            return Err(PartError::Corrupted(format!(
                "{} trailing bytes after part",
                r.remaining().len()
            )));
        }

        Self::new(
            header,
            creation_time,
            [timestamps, values, index, metaindex, exemplars, exemplars_index],
        )
    }

    /// Builds a view over the six part buffers, in the order timestamps,
    /// values, index, metaindex, exemplars, exemplar index.
    pub(crate) fn new(
        header: PartHeader,
        creation_time: u64,
        buffers: [&'a [u8]; 6],
    ) -> Result<Self> {
        let [timestamps, values, index, metaindex, exemplars, exemplars_index] = buffers;
        let metaindex_rows = MetaindexRow::unmarshal_all(metaindex)?;
        Ok(Self {
            header,
            creation_time,
            timestamps,
            values,
            index,
            metaindex,
            exemplars,
            exemplars_index,
            metaindex_rows,
        })
    }

    /// Part statistics.
    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    /// Unix seconds at which the part was built.
    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    /// Total bytes across the six buffers.
    pub fn size(&self) -> usize {
        self.timestamps.len()
            + self.values.len()
            + self.index.len()
            + self.metaindex.len()
            + self.exemplars.len()
            + self.exemplars_index.len()
    }

    /// Metaindex rows, one per index block.
    pub fn metaindex_rows(&self) -> &[MetaindexRow] {
        &self.metaindex_rows
    }

    /// Marshaled metric timestamps.
    pub fn timestamps_data(&self) -> &'a [u8] {
        self.timestamps
    }

    /// Marshaled metric values.
    pub fn values_data(&self) -> &'a [u8] {
        self.values
    }

    /// Metric block headers.
    pub fn index_data(&self) -> &'a [u8] {
        self.index
    }

    /// Marshaled metaindex rows.
    pub fn metaindex_data(&self) -> &'a [u8] {
        self.metaindex
    }

    /// Exemplar payload blob.
    pub fn exemplars_data(&self) -> &'a [u8] {
        self.exemplars
    }

    /// Exemplar block headers.
    pub fn exemplars_index_data(&self) -> &'a [u8] {
        self.exemplars_index
    }

    /// Iterates metric block headers in write order.
    ///
    /// Each index block is checksummed before its headers are yielded.
    /// Iteration stops after the first error.
    pub fn block_headers(&self) -> BlockHeaders<'_> {
        BlockHeaders {
            index: self.index,
            rows: self.metaindex_rows.iter(),
            block: &[],
            remaining: 0,
            failed: false,
        }
    }

    /// Iterates exemplar block headers in write order.
    pub fn exemplar_block_headers(&self) -> ExemplarBlockHeaders<'a> {
        ExemplarBlockHeaders {
            src: self.exemplars_index,
            failed: false,
        }
    }

    /// Decodes the rows of a metric block.
    pub fn read_block(&self, header: &BlockHeader) -> Result<DecodedBlock<'a>> {
        let mut block = DecodedBlock::new(header.tsid);
        decode_columns(
            &mut block,
            header,
            slice(self.values, header.values_range()?, "values segment")?,
            slice(self.timestamps, header.timestamps_range()?, "timestamps segment")?,
        )?;
        Ok(block)
    }

    /// Decodes the rows and tag sets of an exemplar block.
    pub fn read_exemplar_block(&self, header: &BlockHeader) -> Result<DecodedBlock<'a>> {
        let mut block = DecodedBlock::new(header.tsid);
        decode_columns(
            &mut block,
            header,
            slice(self.exemplars, header.values_range()?, "values segment")?,
            slice(self.exemplars, header.timestamps_range()?, "timestamps segment")?,
        )?;

        let mut tags = slice(self.exemplars, header.tags_range()?, "tags segment")?;
        for _ in 0..header.rows_count {
            let mut labels = Vec::new();
            tags = unmarshal_tag_set(&mut labels, tags)?;
            block.tag_sets.push(labels);
        }
        if !tags.is_empty() {
            return Err(PartError::Corrupted(format!(
                "{} trailing bytes after exemplar tag sets",
                tags.len()
            )));
        }
        Ok(block)
    }
}

/// Rows of one decoded block.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock<'a> {
    /// Series of the block.
    pub tsid: Tsid,
    /// Timestamps in row order.
    pub timestamps: Vec<i64>,
    /// Values in row order.
    pub values: Vec<f64>,
    /// Tag set per row; empty for metric blocks.
    pub tag_sets: Vec<Vec<Label<'a>>>,
}

impl DecodedBlock<'_> {
    fn new(tsid: Tsid) -> Self {
        Self {
            tsid,
            timestamps: Vec::new(),
            values: Vec::new(),
            tag_sets: Vec::new(),
        }
    }
}

fn decode_columns(
    block: &mut DecodedBlock<'_>,
    header: &BlockHeader,
    values: &[u8],
    timestamps: &[u8],
) -> Result<()> {
    let count = header.rows_count as usize;
    let mut decimals = Vec::with_capacity(count.min(MAX_ROWS_PER_BLOCK));
    unmarshal_int64s(
        &mut decimals,
        values,
        header.values_marshal_type,
        header.first_value,
        count,
    )?;
    append_decimal_to_floats(&mut block.values, &decimals, header.scale);
    unmarshal_int64s(
        &mut block.timestamps,
        timestamps,
        header.timestamps_marshal_type,
        header.first_timestamp,
        count,
    )
}

fn slice<'a>(
    src: &'a [u8],
    range: std::ops::Range<usize>,
    what: &'static str,
) -> Result<&'a [u8]> {
    src.get(range.clone())
        .ok_or_else(|| PartError::truncated(what, range.end, src.len()))
}

/// Iterator over metric block headers, see [`Part::block_headers`].
pub struct BlockHeaders<'p> {
    index: &'p [u8],
    rows: std::slice::Iter<'p, MetaindexRow>,
    block: &'p [u8],
    remaining: u32,
    failed: bool,
}

impl Iterator for BlockHeaders<'_> {
    type Item = Result<BlockHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.remaining == 0 {
            if !self.block.is_empty() {
                self.failed = true;
                return Some(Err(PartError::Corrupted(format!(
                    "{} trailing bytes in index block",
                    self.block.len()
                ))));
            }
            let row = self.rows.next()?;
            match row.index_block(self.index) {
                Ok(block) => {
                    self.block = block;
                    self.remaining = row.block_headers_count;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        match BlockHeader::unmarshal(self.block) {
            Ok((header, tail)) => {
                self.block = tail;
                self.remaining -= 1;
                Some(Ok(header))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over exemplar block headers, see [`Part::exemplar_block_headers`].
pub struct ExemplarBlockHeaders<'a> {
    src: &'a [u8],
    failed: bool,
}

impl Iterator for ExemplarBlockHeaders<'_> {
    type Item = Result<BlockHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.src.is_empty() {
            return None;
        }
        match BlockHeader::unmarshal(self.src) {
            Ok((header, tail)) => {
                self.src = tail;
                Some(Ok(header))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
