//! Row models handed to the block encoder.

pub mod label;
pub mod row;
pub mod tsid;

pub use label::{marshal_tag_set, unmarshal_tag_set, Label, TAG_SET_PREFIX_SIZE};
pub use row::{ExemplarRow, RawExemplar, RawRow};
pub use tsid::{Tsid, TSID_SIZE};
