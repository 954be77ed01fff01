//! In-memory parts.
//!
//! An [`InmemoryPart`] owns six buffers filled by the block encoder:
//!
//! | Buffer | Contents |
//! |---|---|
//! | timestamps | marshaled metric timestamps |
//! | values | marshaled metric values |
//! | index | metric block headers, grouped into index blocks |
//! | metaindex | one [`MetaindexRow`] per index block |
//! | exemplars | per block `[values][timestamps][tag sets]` |
//! | exemplars index | exemplar block headers |
//!
//! [`InmemoryPart::new_part`] turns it into a borrowed [`Part`] view.

pub mod header;
pub mod inmemory;
pub mod metaindex;
pub mod sink;
pub mod view;

pub use header::{PartHeader, PART_HEADER_SIZE};
pub use inmemory::InmemoryPart;
pub use metaindex::{IndexWriter, MetaindexRow, METAINDEX_ROW_SIZE};
pub use sink::{ExemplarSink, MetricSink};
pub use view::{BlockHeaders, DecodedBlock, ExemplarBlockHeaders, Part, PART_MAGIC};
