//! In-memory part: the six buffers of a freshly encoded part.

use crate::block::{BlockEncoder, BLOCK_HEADER_SIZE};
use crate::buffer::{must_write, ByteBuffer};
use crate::error::Result;
use crate::model::{RawExemplar, RawRow};
use crate::part::header::PartHeader;
use crate::part::metaindex::{IndexWriter, METAINDEX_ROW_SIZE};
use crate::part::sink::{ExemplarSink, MetricSink};
use crate::part::view::{Part, PART_MAGIC};
use crate::pool::block_encoder_pool;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Reusable buffer set holding one encoded, not yet persisted part.
///
/// Instances are meant to be taken from
/// [`inmemory_part_pool`](crate::pool::inmemory_part_pool), filled once by
/// [`InmemoryPart::init_from_rows`] or
/// [`InmemoryPart::init_from_rows_with_exemplars`], handed downstream as a
/// [`Part`] and returned to the pool. Reset keeps every allocation.
#[derive(Debug, Default)]
pub struct InmemoryPart {
    header: PartHeader,
    creation_time: u64,
    timestamps: ByteBuffer,
    values: ByteBuffer,
    index: ByteBuffer,
    metaindex: ByteBuffer,
    exemplars: ByteBuffer,
    exemplars_index: ByteBuffer,
}

impl InmemoryPart {
    /// Creates an empty part.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty part whose metric buffers already hold one block of
    /// `rows` rows, its header and its metaindex row.
    pub fn with_block_capacity(rows: usize) -> Self {
        Self {
            timestamps: ByteBuffer::with_capacity(rows),
            values: ByteBuffer::with_capacity(rows),
            index: ByteBuffer::with_capacity(BLOCK_HEADER_SIZE),
            metaindex: ByteBuffer::with_capacity(METAINDEX_ROW_SIZE),
            ..Self::default()
        }
    }

    /// Clears all buffers, the header and the creation time.
    pub fn reset(&mut self) {
        self.header = PartHeader::default();
        self.creation_time = 0;
        self.timestamps.reset();
        self.values.reset();
        self.index.reset();
        self.metaindex.reset();
        self.exemplars.reset();
        self.exemplars_index.reset();
    }

    /// Fills the part from metric rows.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is empty.
    pub fn init_from_rows(&mut self, rows: &[RawRow]) {
        self.init_from_rows_with_exemplars(rows, &[]);
    }

    /// Fills the part from metric rows and exemplars.
    ///
    /// Both batches must be ordered by series, then timestamp. The block
    /// encoder is taken from the process-wide pool.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is empty.
    pub fn init_from_rows_with_exemplars(&mut self, rows: &[RawRow], exemplars: &[RawExemplar<'_>]) {
        assert_non_empty(rows);
        let mut encoder = block_encoder_pool().acquire();
        self.init_with_encoder(&mut encoder, rows, exemplars);
    }

    /// Fills the part using a caller-provided encoder.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is empty.
    pub fn init_with_encoder(
        &mut self,
        encoder: &mut BlockEncoder,
        rows: &[RawRow],
        exemplars: &[RawExemplar<'_>],
    ) {
        assert_non_empty(rows);
        self.reset();

        let index_block_size = encoder.config().index_block_size;
        let mut metric_sink = MetricSink::new(
            &mut self.values,
            &mut self.timestamps,
            IndexWriter::new(&mut self.index, &mut self.metaindex, index_block_size),
        );
        let metrics = encoder.encode(rows, &mut metric_sink);
        let index_blocks = metric_sink.finish();

        let mut exemplar_sink = ExemplarSink::new(&mut self.exemplars, &mut self.exemplars_index);
        let exemplar_summary = encoder.encode(exemplars, &mut exemplar_sink);

        self.header = PartHeader {
            rows_count: metrics.rows,
            blocks_count: metrics.blocks,
            exemplars_count: exemplar_summary.rows,
            exemplar_blocks_count: exemplar_summary.blocks,
            min_timestamp: metrics.min_timestamp,
            max_timestamp: metrics.max_timestamp,
        };
        self.creation_time = unix_now();

        debug!(
            "Built in-memory part: {} rows in {} blocks ({} index blocks), {} exemplars in {} blocks, {} bytes",
            self.header.rows_count,
            self.header.blocks_count,
            index_blocks,
            self.header.exemplars_count,
            self.header.exemplar_blocks_count,
            self.size()
        );
    }

    /// Returns an immutable view over the encoded buffers.
    ///
    /// The view borrows the part, so the part cannot be reset or reused while
    /// a view is alive.
    pub fn new_part(&self) -> Result<Part<'_>> {
        Part::new(
            self.header,
            self.creation_time,
            [
                self.timestamps.as_slice(),
                self.values.as_slice(),
                self.index.as_slice(),
                self.metaindex.as_slice(),
                self.exemplars.as_slice(),
                self.exemplars_index.as_slice(),
            ],
        )
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

    /// Part statistics.
    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    /// Unix seconds at which the part was last initialized; zero after reset.
    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    /// Marshaled metric timestamps.
    pub fn timestamps(&self) -> &ByteBuffer {
        &self.timestamps
    }

    /// Marshaled metric values.
    pub fn values(&self) -> &ByteBuffer {
        &self.values
    }

    /// Metric block headers.
    pub fn index(&self) -> &ByteBuffer {
        &self.index
    }

    /// Metaindex rows.
    pub fn metaindex(&self) -> &ByteBuffer {
        &self.metaindex
    }

    /// Exemplar payload blob.
    pub fn exemplars(&self) -> &ByteBuffer {
        &self.exemplars
    }

    /// Exemplar block headers.
    pub fn exemplars_index(&self) -> &ByteBuffer {
        &self.exemplars_index
    }

    /// Serializes the part into `w`.
    ///
    /// Layout: magic, part header, creation time, then each buffer as a
    /// `u64` length followed by its bytes. [`Part::from_bytes`] parses it.
    ///
    /// # Panics
    ///
    /// Panics if the sink fails.
    pub fn must_write_to<W: Write>(&self, w: &mut W) {
        let mut prefix = Vec::with_capacity(64);
        // Magic (4 bytes)
        prefix.extend_from_slice(&PART_MAGIC);
        // Part header (48 bytes)
        self.header.marshal(&mut prefix);
        // Creation time (8 bytes)
        prefix.extend_from_slice(&self.creation_time.to_le_bytes());
        must_write(w, &prefix);

        for buf in [
            &self.timestamps,
            &self.values,
            &self.index,
            &self.metaindex,
            &self.exemplars,
            &self.exemplars_index,
        ] {
            must_write(w, &(buf.len() as u64).to_le_bytes());
            buf.must_write_to(w);
        }
    }
}

fn assert_non_empty(rows: &[RawRow]) {
    assert!(
        !rows.is_empty(),
        "BUG: cannot build an in-memory part from zero rows"
    );
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
