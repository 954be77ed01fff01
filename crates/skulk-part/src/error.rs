//! Error and Result types for Skulk part decoding.
//!
//! Encoding never fails: the write path either produces a correct part or
//! aborts on a violated contract. Only the decode side of the codecs returns
//! these errors.

use crate::encoding::MarshalType;
use thiserror::Error;

/// A convenience `Result` type for Skulk part operations.
pub type Result<T> = std::result::Result<T, PartError>;

/// The error type for decoding part buffers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartError {
    /// Input ended before a complete item could be read.
    #[error("Truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        /// What was being decoded.
        what: &'static str,
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },

    /// Unknown marshal type code.
    #[error("Invalid marshal type: {0}")]
    InvalidMarshalType(u8),

    /// Varint does not fit in 64 bits.
    #[error("Varint overflow")]
    VarintOverflow,

    /// Index block checksum does not match the metaindex.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// CRC32 recorded in the metaindex.
        expected: u32,
        /// CRC32 computed over the index block.
        actual: u32,
    },

    /// Zstd stage of a marshaled stream could not be decompressed.
    #[error("Decompression error ({marshal_type:?}): {reason}")]
    Decompression {
        /// Marshal type of the stream.
        marshal_type: MarshalType,
        /// Underlying error message.
        reason: String,
    },

    /// Structurally invalid data.
    #[error("Corrupted data: {0}")]
    Corrupted(String),
}

impl PartError {
    pub(crate) fn truncated(what: &'static str, need: usize, have: usize) -> Self {
        Self::Truncated { what, need, have }
    }
}
