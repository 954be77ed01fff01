//! Block encoder.
//!
//! Splits an ordered row batch into blocks and hands each encoded block to a
//! [`BlockSink`]:
//!
//! ```text
//! rows (ordered by tsid, then timestamp)
//!   │  scan: same tsid and block not full → accumulate
//!   ▼
//! flush_block
//!   ├── floats → decimals (shared scale)
//!   ├── marshal values     (block precision bits)
//!   ├── marshal timestamps (lossless)
//!   ├── tag sets           (exemplars only)
//!   └── sink.write_block(header, segments)
//! ```
//!
//! The final block is flushed explicitly after the scan. Scratch buffers are
//! owned by the encoder and survive between batches, so a pooled encoder does
//! not allocate in steady state.

use crate::block::header::BlockHeader;
use crate::config::EncoderConfig;
use crate::encoding::{append_floats_to_decimal, marshal_timestamps, marshal_values};
use crate::encoding::marshal::LOSSLESS_PRECISION_BITS;
use crate::model::{marshal_tag_set, RawExemplar, RawRow, Tsid};

/// A row the block encoder can consume.
pub trait BlockRow {
    /// Series the row belongs to.
    fn tsid(&self) -> &Tsid;

    /// Unix timestamp in milliseconds.
    fn timestamp(&self) -> i64;

    /// Sample value.
    fn value(&self) -> f64;

    /// Precision bits requested for the value.
    fn precision_bits(&self) -> u8;

    /// Appends the row's framed tag set. Rows without tags append nothing.
    fn marshal_tags(&self, _dst: &mut Vec<u8>) {}
}

impl BlockRow for RawRow {
    fn tsid(&self) -> &Tsid {
        &self.tsid
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn precision_bits(&self) -> u8 {
        self.precision_bits
    }
}

impl BlockRow for RawExemplar<'_> {
    fn tsid(&self) -> &Tsid {
        &self.tsid
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn precision_bits(&self) -> u8 {
        self.precision_bits
    }

    fn marshal_tags(&self, dst: &mut Vec<u8>) {
        marshal_tag_set(dst, &self.labels);
    }
}

/// Encoded payload of one block.
#[derive(Debug, Clone, Copy)]
pub struct BlockSegments<'a> {
    /// Marshaled decimal mantissas.
    pub values: &'a [u8],
    /// Marshaled timestamps.
    pub timestamps: &'a [u8],
    /// Concatenated tag sets; empty for metric blocks.
    pub tags: &'a [u8],
}

/// Destination of encoded blocks.
pub trait BlockSink {
    /// Stores the segments, fills in the header offsets and records the
    /// header.
    fn write_block(&mut self, header: &mut BlockHeader, segments: &BlockSegments<'_>);
}

/// Totals of one [`BlockEncoder::encode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Rows encoded.
    pub rows: u64,
    /// Blocks flushed.
    pub blocks: u64,
    /// Smallest timestamp seen, `i64::MAX` when no rows were encoded.
    pub min_timestamp: i64,
    /// Largest timestamp seen, `i64::MIN` when no rows were encoded.
    pub max_timestamp: i64,
}

impl Default for EncodeSummary {
    fn default() -> Self {
        Self {
            rows: 0,
            blocks: 0,
            min_timestamp: i64::MAX,
            max_timestamp: i64::MIN,
        }
    }
}

/// Groups rows into blocks and encodes them.
#[derive(Debug)]
pub struct BlockEncoder {
    config: EncoderConfig,
    timestamps: Vec<i64>,
    floats: Vec<f64>,
    decimal_pairs: Vec<(i64, i16)>,
    decimals: Vec<i64>,
    tags: Vec<u8>,
    values_buf: Vec<u8>,
    timestamps_buf: Vec<u8>,
}

impl Default for BlockEncoder {
    fn default() -> Self {
        Self::new(EncoderConfig::default())
    }
}

impl BlockEncoder {
    /// Creates an encoder with scratch sized for a full block.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    pub fn new(config: EncoderConfig) -> Self {
        config.validate();
        let rows = config.max_rows_per_block;
        Self {
            config,
            timestamps: Vec::with_capacity(rows),
            floats: Vec::with_capacity(rows),
            decimal_pairs: Vec::with_capacity(rows),
            decimals: Vec::with_capacity(rows),
            tags: Vec::new(),
            values_buf: Vec::with_capacity(rows),
            timestamps_buf: Vec::with_capacity(rows),
        }
    }

    /// Returns the encoder configuration.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Clears all scratch state, keeping allocations.
    pub fn reset(&mut self) {
        self.timestamps.clear();
        self.floats.clear();
        self.decimal_pairs.clear();
        self.decimals.clear();
        self.tags.clear();
        self.values_buf.clear();
        self.timestamps_buf.clear();
    }

    /// Encodes `rows` into `sink`, one block per same-series run.
    ///
    /// Rows are expected ordered by series, then by timestamp; nothing is
    /// sorted here. A run longer than the configured cap is split into
    /// consecutive blocks of the same series.
    pub fn encode<R, S>(&mut self, rows: &[R], sink: &mut S) -> EncodeSummary
    where
        R: BlockRow,
        S: BlockSink,
    {
        self.reset();
        let mut summary = EncodeSummary::default();
        let mut block_start = 0;

        for (i, row) in rows.iter().enumerate() {
            if i > block_start
                && (row.tsid() != rows[block_start].tsid()
                    || self.timestamps.len() >= self.config.max_rows_per_block)
            {
                self.flush_block(&rows[block_start], sink, &mut summary);
                block_start = i;
            }
            self.timestamps.push(row.timestamp());
            self.floats.push(row.value());
            row.marshal_tags(&mut self.tags);
        }

        if !self.timestamps.is_empty() {
            self.flush_block(&rows[block_start], sink, &mut summary);
        }
        summary
    }

    fn flush_block<R, S>(&mut self, first: &R, sink: &mut S, summary: &mut EncodeSummary)
    where
        R: BlockRow,
        S: BlockSink,
    {
        let precision_bits = first.precision_bits();

        let scale =
            append_floats_to_decimal(&mut self.decimals, &mut self.decimal_pairs, &self.floats);
        let (values_marshal_type, first_value) =
            marshal_values(&mut self.values_buf, &self.decimals, precision_bits);
        let (timestamps_marshal_type, first_timestamp) = marshal_timestamps(
            &mut self.timestamps_buf,
            &self.timestamps,
            LOSSLESS_PRECISION_BITS,
        );

        let (block_min, block_max) = self
            .timestamps
            .iter()
            .fold((i64::MAX, i64::MIN), |(lo, hi), &t| (lo.min(t), hi.max(t)));

        let mut header = BlockHeader {
            tsid: *first.tsid(),
            first_value,
            min_timestamp: block_min,
            scale,
            precision_bits,
            values_marshal_type,
            timestamps_marshal_type,
            rows_count: self.timestamps.len() as u32,
            max_timestamp: block_max,
            timestamps_size: segment_size(self.timestamps_buf.len()),
            values_size: segment_size(self.values_buf.len()),
            tags_size: segment_size(self.tags.len()),
            first_timestamp,
            ..BlockHeader::default()
        };
        let segments = BlockSegments {
            values: &self.values_buf,
            timestamps: &self.timestamps_buf,
            tags: &self.tags,
        };
        sink.write_block(&mut header, &segments);

        summary.rows += self.timestamps.len() as u64;
        summary.blocks += 1;
        summary.min_timestamp = summary.min_timestamp.min(block_min);
        summary.max_timestamp = summary.max_timestamp.max(block_max);

        self.reset();
    }
}

fn segment_size(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(size) => size,
        Err(_) => panic!("BUG: block segment of {} bytes exceeds u32 range", len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::unmarshal_int64s;
    use crate::model::Label;

    /// Keeps headers and copies of the segments.
    #[derive(Default)]
    struct CollectSink {
        blocks: Vec<(BlockHeader, Vec<u8>, Vec<u8>, Vec<u8>)>,
    }

    impl BlockSink for CollectSink {
        fn write_block(&mut self, header: &mut BlockHeader, segments: &BlockSegments<'_>) {
            self.blocks.push((
                *header,
                segments.values.to_vec(),
                segments.timestamps.to_vec(),
                segments.tags.to_vec(),
            ));
        }
    }

    fn row(metric_id: u64, timestamp: i64, value: f64) -> RawRow {
        RawRow::new(Tsid::from_metric_id(metric_id), timestamp, value, 64)
    }

    #[test]
    fn test_single_series_single_block() {
        let rows = vec![row(1, 1000, 1.5), row(1, 2000, 2.5), row(1, 3000, 3.5)];
        let mut encoder = BlockEncoder::default();
        let mut sink = CollectSink::default();
        let summary = encoder.encode(&rows, &mut sink);

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.min_timestamp, 1000);
        assert_eq!(summary.max_timestamp, 3000);

        let (header, values, timestamps, tags) = &sink.blocks[0];
        assert_eq!(header.rows_count, 3);
        assert_eq!(header.scale, -1);
        assert_eq!(header.first_value, 15);
        assert_eq!(header.min_timestamp, 1000);
        assert_eq!(header.max_timestamp, 3000);
        assert!(tags.is_empty());

        let mut decimals = Vec::new();
        unmarshal_int64s(&mut decimals, values, header.values_marshal_type, header.first_value, 3)
            .unwrap();
        assert_eq!(decimals, vec![15, 25, 35]);

        let mut ts = Vec::new();
        unmarshal_int64s(
            &mut ts,
            timestamps,
            header.timestamps_marshal_type,
            header.first_timestamp,
            3,
        )
        .unwrap();
        assert_eq!(ts, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_series_change_splits_blocks() {
        let rows = vec![row(1, 1, 1.0), row(2, 1, 1.0), row(1, 2, 1.0), row(2, 2, 1.0)];
        let mut encoder = BlockEncoder::default();
        let mut sink = CollectSink::default();
        let summary = encoder.encode(&rows, &mut sink);

        assert_eq!(summary.blocks, 4);
        let ids: Vec<u64> = sink.blocks.iter().map(|b| b.0.tsid.metric_id).collect();
        assert_eq!(ids, vec![1, 2, 1, 2]);
        assert!(sink.blocks.iter().all(|b| b.0.rows_count == 1));
    }

    #[test]
    fn test_row_cap_splits_run() {
        let config = EncoderConfig::default().with_max_rows_per_block(4);
        let rows: Vec<RawRow> = (0..10).map(|i| row(9, i, i as f64)).collect();
        let mut encoder = BlockEncoder::new(config);
        let mut sink = CollectSink::default();
        encoder.encode(&rows, &mut sink);

        let counts: Vec<u32> = sink.blocks.iter().map(|b| b.0.rows_count).collect();
        assert_eq!(counts, vec![4, 4, 2]);
        assert_eq!(sink.blocks[1].0.min_timestamp, 4);
        assert_eq!(sink.blocks[2].0.max_timestamp, 9);
    }

    #[test]
    fn test_precision_bits_from_first_row() {
        let rows = vec![
            RawRow::new(Tsid::from_metric_id(1), 1, 1.0, 12),
            RawRow::new(Tsid::from_metric_id(1), 2, 2.0, 64),
        ];
        let mut encoder = BlockEncoder::default();
        let mut sink = CollectSink::default();
        encoder.encode(&rows, &mut sink);
        assert_eq!(sink.blocks[0].0.precision_bits, 12);
    }

    #[test]
    fn test_exemplar_tags_follow_rows() {
        let exemplars = vec![
            RawExemplar::new(Tsid::from_metric_id(1), 5, 0.5, 64, vec![Label::new(b"a", b"b")]),
            RawExemplar::new(Tsid::from_metric_id(1), 6, 0.7, 64, Vec::new()),
        ];
        let mut encoder = BlockEncoder::default();
        let mut sink = CollectSink::default();
        encoder.encode(&exemplars, &mut sink);

        let (header, _, _, tags) = &sink.blocks[0];
        assert_eq!(header.tags_size as usize, tags.len());
        let mut expected = Vec::new();
        marshal_tag_set(&mut expected, &exemplars[0].labels);
        marshal_tag_set(&mut expected, &[]);
        assert_eq!(tags, &expected);
    }

    #[test]
    fn test_unordered_timestamps_keep_true_bounds() {
        let rows = vec![row(4, 300, 1.0), row(4, 100, 2.0), row(4, 500, 3.0), row(4, 200, 4.0)];
        let mut encoder = BlockEncoder::default();
        let mut sink = CollectSink::default();
        let summary = encoder.encode(&rows, &mut sink);

        let (header, _, timestamps, _) = &sink.blocks[0];
        assert_eq!(header.first_timestamp, 300);
        assert_eq!(header.min_timestamp, 100);
        assert_eq!(header.max_timestamp, 500);
        assert_eq!((summary.min_timestamp, summary.max_timestamp), (100, 500));

        let mut ts = Vec::new();
        unmarshal_int64s(
            &mut ts,
            timestamps,
            header.timestamps_marshal_type,
            header.first_timestamp,
            4,
        )
        .unwrap();
        assert_eq!(ts, vec![300, 100, 500, 200]);
    }

    #[test]
    fn test_empty_batch_flushes_nothing() {
        let mut encoder = BlockEncoder::default();
        let mut sink = CollectSink::default();
        let summary = encoder.encode::<RawRow, _>(&[], &mut sink);
        assert!(sink.blocks.is_empty());
        assert_eq!(summary, EncodeSummary::default());
    }

    #[test]
    fn test_reuse_gives_identical_output() {
        let rows: Vec<RawRow> = (0..50).map(|i| row(i / 10, i as i64, i as f64 * 0.3)).collect();
        let mut encoder = BlockEncoder::default();

        let mut first = CollectSink::default();
        encoder.encode(&rows, &mut first);
        let mut second = CollectSink::default();
        encoder.encode(&rows, &mut second);

        assert_eq!(first.blocks, second.blocks);
    }
}
