//! Low-level codecs used by the block encoder.
//!
//! - [`decimal`]: float to shared-scale decimal mantissas
//! - [`marshal`]: adaptive int64 stream encoding
//! - [`varint`]: LEB128 varints

pub mod decimal;
pub mod marshal;
pub mod varint;

pub use decimal::{append_decimal_to_floats, append_floats_to_decimal};
pub use marshal::{
    marshal_int64s, marshal_timestamps, marshal_values, unmarshal_int64s, MarshalType,
};
