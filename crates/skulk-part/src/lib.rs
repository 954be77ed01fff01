//! Skulk Part - in-memory columnar part encoder for Alopex Skulk
//!
//! This crate turns batches of freshly ingested samples, and the exemplars
//! attached to them, into the compact binary form of a storage part.
//!
//! # Components
//!
//! - [`BlockEncoder`]: groups rows by series into bounded blocks and encodes them
//! - [`InmemoryPart`]: the six buffers of one part, plus its header
//! - [`Part`]: immutable view over an encoded part
//! - [`Pool`]: bounded pools recycling encoders and parts
//! - [`encoding`]: decimal conversion and adaptive int64 encoding
//!
//! # Example
//!
//! ```rust
//! use skulk_part::{inmemory_part_pool, Label, RawExemplar, RawRow, Tsid};
//!
//! let series = Tsid::from_metric_id(42);
//! let rows = vec![
//!     RawRow::new(series, 1_700_000_000_000, 0.25, 64),
//!     RawRow::new(series, 1_700_000_015_000, 0.75, 64),
//! ];
//! let exemplars = vec![RawExemplar::new(
//!     series,
//!     1_700_000_015_000,
//!     0.75,
//!     64,
//!     vec![Label::new(b"trace_id", b"4bf92f35")],
//! )];
//!
//! let mut part = inmemory_part_pool().acquire();
//! part.init_from_rows_with_exemplars(&rows, &exemplars);
//!
//! let view = part.new_part()?;
//! for header in view.block_headers() {
//!     let header = header?;
//!     let block = view.read_block(&header)?;
//!     assert_eq!(block.values, vec![0.25, 0.75]);
//! }
//! # Ok::<(), skulk_part::PartError>(())
//! ```

#![deny(missing_docs)]

pub mod block;
pub mod buffer;
pub mod config;
pub mod encoding;
pub mod error;
pub mod model;
pub mod part;
pub mod pool;

pub use block::{BlockEncoder, BlockHeader, BlockRow, BlockSink};
pub use buffer::ByteBuffer;
pub use config::{EncoderConfig, MAX_ROWS_PER_BLOCK};
pub use error::{PartError, Result};
pub use model::{ExemplarRow, Label, RawExemplar, RawRow, Tsid};
pub use part::{InmemoryPart, MetaindexRow, Part, PartHeader};
pub use pool::{block_encoder_pool, inmemory_part_pool, Pool, Pooled, Reusable};
