//! Block sinks writing into the buffers of an in-memory part.

use crate::block::{BlockHeader, BlockSegments, BlockSink, BLOCK_HEADER_SIZE};
use crate::buffer::ByteBuffer;
use crate::part::metaindex::IndexWriter;

/// Sink for metric blocks.
///
/// Values and timestamps go to separate blobs; headers go through an
/// [`IndexWriter`].
pub struct MetricSink<'a> {
    values: &'a mut ByteBuffer,
    timestamps: &'a mut ByteBuffer,
    index: IndexWriter<'a>,
}

impl<'a> MetricSink<'a> {
    /// Creates a sink over the metric buffers of a part.
    pub fn new(
        values: &'a mut ByteBuffer,
        timestamps: &'a mut ByteBuffer,
        index: IndexWriter<'a>,
    ) -> Self {
        Self {
            values,
            timestamps,
            index,
        }
    }

    /// Closes the last index block and returns the index block count.
    pub fn finish(self) -> u64 {
        self.index.finish()
    }
}

impl BlockSink for MetricSink<'_> {
    fn write_block(&mut self, header: &mut BlockHeader, segments: &BlockSegments<'_>) {
        header.values_offset = self.values.append(segments.values);
        header.timestamps_offset = self.timestamps.append(segments.timestamps);
        header.tags_offset = 0;
        self.index.add(header);
    }
}

/// Sink for exemplar blocks.
///
/// Each block lands in the exemplars blob as `[values][timestamps][tag sets]`;
/// headers are written back to back into the exemplar index.
pub struct ExemplarSink<'a> {
    exemplars: &'a mut ByteBuffer,
    index: &'a mut ByteBuffer,
    buf: Vec<u8>,
}

impl<'a> ExemplarSink<'a> {
    /// Creates a sink over the exemplar buffers of a part.
    pub fn new(exemplars: &'a mut ByteBuffer, index: &'a mut ByteBuffer) -> Self {
        Self {
            exemplars,
            index,
            buf: Vec::with_capacity(BLOCK_HEADER_SIZE),
        }
    }
}

impl BlockSink for ExemplarSink<'_> {
    fn write_block(&mut self, header: &mut BlockHeader, segments: &BlockSegments<'_>) {
        header.values_offset = self.exemplars.append(segments.values);
        header.timestamps_offset = self.exemplars.append(segments.timestamps);
        header.tags_offset = self.exemplars.append(segments.tags);

        self.buf.clear();
        header.marshal(&mut self.buf);
        self.index.append(&self.buf);
    }
}
