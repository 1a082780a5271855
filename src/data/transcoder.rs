//! Row → typed record conversion.
//!
//! [`RecordTranscoder`] sits between a [`LineSource`](super::line_source::LineSource) and the
//! record consumers. It names the device after the input file, parses the timestamp and value
//! columns, and forwards each good record to its [`RecordListener`]s. A row that does not parse
//! is logged and dropped; it never reaches a listener and is not counted.

use crate::core::{
    LineListener, LineRecord, RecordListener, SensorValue, TimeSeriesRecord, ValueDomain,
};
use crate::error::VizError;
use std::path::Path;
use tracing::{trace, warn};

const TIMESTAMP_FIELD: usize = 0;
const VALUE_FIELD: usize = 1;

/// Converts one device file's rows into [`TimeSeriesRecord`]s.
pub struct RecordTranscoder<'a> {
    domain: ValueDomain,
    device: String,
    num_records: usize,
    listeners: Vec<&'a mut dyn RecordListener>,
}

impl<'a> RecordTranscoder<'a> {
    /// Creates a transcoder parsing values in `domain`.
    pub fn new(domain: ValueDomain) -> Self {
        Self {
            domain,
            device: String::new(),
            num_records: 0,
            listeners: Vec::new(),
        }
    }

    /// Registers a downstream consumer. Consumers are invoked in registration order.
    pub fn add_listener(&mut self, listener: &'a mut dyn RecordListener) {
        self.listeners.push(listener);
    }

    /// Identifier of the device currently being streamed.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Records accepted so far in the current file.
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Parses one row into a record.
    pub fn parse(&self, line: &LineRecord) -> Result<TimeSeriesRecord, VizError> {
        let fail = |reason: String| VizError::RecordParse {
            line: line.line,
            raw: line.raw(),
            reason,
        };

        let timestamp = line
            .field(TIMESTAMP_FIELD)
            .ok_or_else(|| fail("missing timestamp".into()))?
            .parse::<i32>()
            .map_err(|e| fail(format!("timestamp: {e}")))?;
        let raw_value = line
            .field(VALUE_FIELD)
            .ok_or_else(|| fail("missing value".into()))?;

        match self.domain {
            ValueDomain::Integer => {
                let value = raw_value
                    .parse::<i32>()
                    .map_err(|e| fail(format!("value: {e}")))?;
                Ok(TimeSeriesRecord {
                    timestamp,
                    value: SensorValue::Integer(value),
                    scaled: None,
                })
            }
            ValueDomain::Floating => {
                let value = raw_value
                    .parse::<f64>()
                    .map_err(|e| fail(format!("value: {e}")))?;
                if !value.is_finite() {
                    return Err(fail(format!("value is not finite: {raw_value}")));
                }
                Ok(TimeSeriesRecord {
                    timestamp,
                    value: SensorValue::Floating(value),
                    scaled: Some(scale_to_short(value)),
                })
            }
        }
    }
}

/// `round(value * 10)` as a 16-bit integer.
///
/// Halves round up, toward positive infinity. Results outside the `i16` range saturate.
pub fn scale_to_short(value: f64) -> i16 {
    let scaled = (value * 10.0 + 0.5).floor();
    if scaled > f64::from(i16::MAX) || scaled < f64::from(i16::MIN) {
        warn!(value, "Scaled value out of 16-bit range, saturating");
    }
    // `as` saturates float → int conversions
    scaled as i16
}

/// Device identifier for a time-series file: its name without the final extension.
pub fn device_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl LineListener for RecordTranscoder<'_> {
    fn on_begin(&mut self, path: &Path) {
        self.device = device_name(path);
        self.num_records = 0;
        for listener in self.listeners.iter_mut() {
            listener.on_begin(&self.device);
        }
    }

    fn on_line(&mut self, line: &LineRecord) {
        match self.parse(line) {
            Ok(record) => {
                self.num_records += 1;
                for listener in self.listeners.iter_mut() {
                    listener.on_record(&record);
                }
            }
            Err(e) => warn!(device = %self.device, "{e}. Skipping."),
        }
    }

    fn on_end(&mut self, _path: &Path, num_lines: usize) {
        trace!(device = %self.device, num_lines, num_records = self.num_records, "File finished");
        for listener in self.listeners.iter_mut() {
            listener.on_end(self.num_records);
        }
    }
}
