//! Core traits and data types for the conversion pipeline.
//!
//! Two listener contracts connect the stages:
//!
//! - [`LineListener`] receives the raw row events of a delimited text file from a
//!   [`LineSource`](crate::data::line_source::LineSource).
//! - [`RecordListener`] receives typed time-series records from a
//!   [`RecordTranscoder`](crate::data::transcoder::RecordTranscoder).
//!
//! Listeners are held in registration order and invoked synchronously, one after the other,
//! for every event. No listener may depend on another having seen the event first.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::path::Path;

/// Numeric domain of a dataset's value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    /// 32-bit integer counts.
    Integer,
    /// Floating-point concentrations.
    Floating,
}

/// A single sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue {
    /// A reading from an integer dataset.
    Integer(i32),
    /// A reading from a floating dataset.
    Floating(f64),
}

impl SensorValue {
    /// Sentinel every real reading compares less than or equal to.
    pub fn ceiling(domain: ValueDomain) -> Self {
        match domain {
            ValueDomain::Integer => SensorValue::Integer(i32::MAX),
            ValueDomain::Floating => SensorValue::Floating(f64::INFINITY),
        }
    }

    /// Sentinel every real reading compares greater than or equal to.
    pub fn floor(domain: ValueDomain) -> Self {
        match domain {
            ValueDomain::Integer => SensorValue::Integer(i32::MIN),
            ValueDomain::Floating => SensorValue::Floating(f64::NEG_INFINITY),
        }
    }

    /// Total order over readings. Mixed domains compare as `f64`.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SensorValue::Integer(a), SensorValue::Integer(b)) => a.cmp(b),
            _ => self.as_f64().total_cmp(&other.as_f64()),
        }
    }

    /// The reading widened to `f64`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            SensorValue::Integer(v) => f64::from(v),
            SensorValue::Floating(v) => v,
        }
    }
}

impl Serialize for SensorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            SensorValue::Integer(v) => serializer.serialize_i32(v),
            // serde_json writes non-finite floats as null
            SensorValue::Floating(v) => serializer.serialize_f64(v),
        }
    }
}

/// One typed time-series record, built per accepted line and consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesRecord {
    /// Epoch seconds.
    pub timestamp: i32,
    /// The parsed reading.
    pub value: SensorValue,
    /// `round(value * 10)` for floating datasets; `None` for integer datasets.
    pub scaled: Option<i16>,
}

/// A split row of a delimited text file.
#[derive(Debug, Clone)]
pub struct LineRecord {
    /// 1-based physical line number in the source file.
    pub line: u64,
    /// Trimmed fields of the row.
    pub fields: csv::StringRecord,
    delimiter: u8,
}

impl LineRecord {
    /// Wraps the fields of physical line `line`, split on `delimiter`.
    pub fn new(line: u64, fields: csv::StringRecord, delimiter: u8) -> Self {
        Self {
            line,
            fields,
            delimiter,
        }
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index)
    }

    /// The row's text, rebuilt by joining the fields with the source delimiter.
    pub fn raw(&self) -> String {
        let sep = char::from(self.delimiter).to_string();
        self.fields.iter().collect::<Vec<_>>().join(&sep)
    }
}

/// Consumer of the raw row events of one delimited text file.
pub trait LineListener {
    /// The file was opened and streaming is about to start.
    fn on_begin(&mut self, path: &Path);

    /// The header row, when one was requested and present.
    fn on_header(&mut self, _header: &LineRecord) {}

    /// A non-blank row with at least the minimum number of fields.
    fn on_line(&mut self, line: &LineRecord);

    /// Streaming finished; `num_lines` accepted rows were delivered.
    fn on_end(&mut self, _path: &Path, _num_lines: usize) {}
}

/// Consumer of typed time-series records for one device at a time.
pub trait RecordListener {
    /// A new device's stream starts.
    fn on_begin(&mut self, device: &str);

    /// One successfully parsed record.
    fn on_record(&mut self, record: &TimeSeriesRecord);

    /// The device's stream finished with `num_records` accepted records.
    fn on_end(&mut self, num_records: usize);
}
