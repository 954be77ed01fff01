//! Time series identifier.

use crate::buffer::SliceReader;
use crate::error::Result;

/// Tsid size in bytes.
pub const TSID_SIZE: usize = 24;

/// Identifier of one time series.
///
/// Assigned by series resolution before rows reach the encoder. Ordering is
/// lexicographic over the fields in declaration order, which is also the order
/// rows are expected to arrive in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tsid {
    /// Group of series sharing a metric name.
    pub metric_group_id: u64,
    /// Job the series was scraped by.
    pub job_id: u32,
    /// Instance the series was scraped from.
    pub instance_id: u32,
    /// Unique series id.
    pub metric_id: u64,
}

impl Tsid {
    /// Creates a Tsid with only the unique series id set.
    pub fn from_metric_id(metric_id: u64) -> Self {
        Self {
            metric_id,
            ..Self::default()
        }
    }

    /// Appends the little-endian form of the Tsid.
    pub fn marshal(&self, dst: &mut Vec<u8>) {
        // Metric group id (8 bytes)
        dst.extend_from_slice(&self.metric_group_id.to_le_bytes());
        // Job id (4 bytes)
        dst.extend_from_slice(&self.job_id.to_le_bytes());
        // Instance id (4 bytes)
        dst.extend_from_slice(&self.instance_id.to_le_bytes());
        // Metric id (8 bytes)
        dst.extend_from_slice(&self.metric_id.to_le_bytes());
    }

    /// Reads a Tsid, returning it with the unread tail.
    pub fn unmarshal(src: &[u8]) -> Result<(Self, &[u8])> {
        let mut r = SliceReader::new(src, "tsid");
        r.require(TSID_SIZE)?;
        let tsid = Self::read(&mut r)?;
        Ok((tsid, r.remaining()))
    }

    pub(crate) fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        Ok(Self {
            metric_group_id: r.read_u64()?,
            job_id: r.read_u32()?,
            instance_id: r.read_u32()?,
            metric_id: r.read_u64()?,
        })
    }
}
