//! Block encoding: grouping rows into blocks and describing them with headers.

pub mod encoder;
pub mod header;

pub use encoder::{BlockEncoder, BlockRow, BlockSegments, BlockSink, EncodeSummary};
pub use header::{BlockHeader, BLOCK_HEADER_SIZE};
