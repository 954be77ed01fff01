//! Rows consumed by the block encoder.

use crate::model::{Label, Tsid};

/// Metric sample with a resolved series identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRow {
    /// Series the sample belongs to.
    pub tsid: Tsid,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    /// Sample value.
    pub value: f64,
    /// Significant bits kept by the value encoding; 64 is lossless.
    pub precision_bits: u8,
}

impl RawRow {
    /// Creates a new row.
    pub fn new(tsid: Tsid, timestamp: i64, value: f64, precision_bits: u8) -> Self {
        Self {
            tsid,
            timestamp,
            value,
            precision_bits,
        }
    }
}

/// Exemplar with a resolved series identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExemplar<'a> {
    /// Series the exemplar is attached to.
    pub tsid: Tsid,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    /// Exemplar value.
    pub value: f64,
    /// Significant bits kept by the value encoding; 64 is lossless.
    pub precision_bits: u8,
    /// Exemplar labels, in input order.
    pub labels: Vec<Label<'a>>,
}

impl<'a> RawExemplar<'a> {
    /// Creates a new exemplar.
    pub fn new(
        tsid: Tsid,
        timestamp: i64,
        value: f64,
        precision_bits: u8,
        labels: Vec<Label<'a>>,
    ) -> Self {
        Self {
            tsid,
            timestamp,
            value,
            precision_bits,
            labels,
        }
    }

    /// Copies borrowed label bytes.
    pub fn into_owned(self) -> RawExemplar<'static> {
        RawExemplar {
            tsid: self.tsid,
            timestamp: self.timestamp,
            value: self.value,
            precision_bits: self.precision_bits,
            labels: self.labels.into_iter().map(Label::into_owned).collect(),
        }
    }
}

/// Exemplar as parsed from the ingestion protocol, before series resolution.
///
/// Rows are meant to be reused across a request: [`ExemplarRow::init_from_source`]
/// overwrites the previous contents while keeping the label vector's
/// allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExemplarRow<'a> {
    /// Raw metric name of the series the exemplar belongs to.
    pub metric_name_raw: &'a [u8],
    /// Exemplar labels.
    pub labels: Vec<Label<'a>>,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    /// Exemplar value.
    pub value: f64,
}

impl<'a> ExemplarRow<'a> {
    /// Refills the row from a parsed source.
    ///
    /// Label views are copied, the bytes they point to are not. Input is taken
    /// verbatim: no validation happens here.
    pub fn init_from_source(
        &mut self,
        metric_name_raw: &'a [u8],
        source_labels: &[Label<'a>],
        timestamp: i64,
        value: f64,
    ) {
        self.metric_name_raw = metric_name_raw;
        self.labels.clear();
        self.labels.reserve(source_labels.len());
        self.labels.extend(source_labels.iter().cloned());
        self.timestamp = timestamp;
        self.value = value;
    }

    /// Clears the row, keeping the label allocation.
    pub fn reset(&mut self) {
        self.metric_name_raw = &[];
        self.labels.clear();
        self.timestamp = 0;
        self.value = 0.0;
    }

    /// Builds the encoder input once the series is resolved.
    pub fn to_raw(&self, tsid: Tsid, precision_bits: u8) -> RawExemplar<'a> {
        RawExemplar::new(
            tsid,
            self.timestamp,
            self.value,
            precision_bits,
            self.labels.clone(),
        )
    }

    /// Copies all borrowed bytes.
    ///
    /// The metric name is returned separately, since the row itself only holds
    /// a borrowed name.
    pub fn into_owned(self) -> (Vec<u8>, ExemplarRow<'static>) {
        let name = self.metric_name_raw.to_vec();
        let row = ExemplarRow {
            metric_name_raw: &[],
            labels: self.labels.into_iter().map(Label::into_owned).collect(),
            timestamp: self.timestamp,
            value: self.value,
        };
        (name, row)
    }
}
