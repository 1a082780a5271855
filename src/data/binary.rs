//! Fixed-width binary record output.
//!
//! Every record of every device is appended to one big-endian stream. There is no header,
//! delimiter or length prefix: a device's records are located purely from the metadata
//! document, at `recordOffset * width .. (recordOffset + numRecords) * width`.
//!
//! # Record Layout
//! ```text
//! TimeAndScaledShort (6 bytes):  [i32 epoch seconds][i16 round(value * 10)]
//! TimeAndInt         (8 bytes):  [i32 epoch seconds][i32 value]
//! ```

use crate::core::{RecordListener, SensorValue, TimeSeriesRecord};
use crate::error::{AppResult, VizError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Record encoding of a binary blob. Fixed for the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryLayout {
    /// 4-byte timestamp, 2-byte value scaled by 10.
    TimeAndScaledShort,
    /// 4-byte timestamp, 4-byte integer value.
    TimeAndInt,
}

/// A record read back from a blob. Scaled values are left scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Epoch seconds.
    pub timestamp: i32,
    /// Raw integer value, or the value times ten for scaled layouts.
    pub value: i32,
}

impl BinaryLayout {
    /// Bytes per record.
    pub fn record_width(self) -> usize {
        match self {
            BinaryLayout::TimeAndScaledShort => 6,
            BinaryLayout::TimeAndInt => 8,
        }
    }

    /// Encodes one record into `out`.
    pub fn encode<W: Write>(self, record: &TimeSeriesRecord, out: &mut W) -> std::io::Result<()> {
        out.write_all(&record.timestamp.to_be_bytes())?;
        match self {
            BinaryLayout::TimeAndScaledShort => {
                let scaled = record.scaled.unwrap_or_else(|| {
                    crate::data::transcoder::scale_to_short(record.value.as_f64())
                });
                out.write_all(&scaled.to_be_bytes())
            }
            BinaryLayout::TimeAndInt => {
                let value = match record.value {
                    SensorValue::Integer(v) => v,
                    // truncation toward zero; integer datasets never produce floats
                    SensorValue::Floating(v) => v as i32,
                };
                out.write_all(&value.to_be_bytes())
            }
        }
    }

    /// Decodes a run of whole records. Trailing bytes short of a record are ignored.
    pub fn decode_records(self, bytes: &[u8]) -> Vec<DecodedRecord> {
        bytes
            .chunks_exact(self.record_width())
            .map(|chunk| {
                let timestamp = i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                let value = match self {
                    BinaryLayout::TimeAndScaledShort => {
                        i32::from(i16::from_be_bytes([chunk[4], chunk[5]]))
                    }
                    BinaryLayout::TimeAndInt => {
                        i32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]])
                    }
                };
                DecodedRecord { timestamp, value }
            })
            .collect()
    }

    /// Cuts one device's records out of a blob using its `recordOffset` and `numRecords`.
    ///
    /// Returns `None` when the blob is too short for the advertised range.
    pub fn device_slice(self, record_offset: usize, num_records: usize, blob: &[u8]) -> Option<&[u8]> {
        let width = self.record_width();
        let start = record_offset.checked_mul(width)?;
        let end = start.checked_add(num_records.checked_mul(width)?)?;
        blob.get(start..end)
    }
}

/// Appends every record of every device to a single binary output.
pub struct BinaryEncoder {
    path: PathBuf,
    layout: BinaryLayout,
    writer: Option<BufWriter<File>>,
    records_written: u64,
    write_failures: u64,
}

impl BinaryEncoder {
    /// Creates (truncating) the output file. Called once per run.
    pub fn create(path: impl Into<PathBuf>, layout: BinaryLayout) -> AppResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| VizError::output(&path, e))?;
        info!(path = %path.display(), width = layout.record_width(), "Binary output opened");
        Ok(Self {
            path,
            layout,
            writer: Some(BufWriter::new(file)),
            records_written: 0,
            write_failures: 0,
        })
    }

    /// Records successfully handed to the output so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Records that could not be written. They are missing from the blob.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Flushes and closes the output.
    ///
    /// Failures are logged and returned; nothing already written is removed.
    pub fn finish(&mut self) -> AppResult<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        if self.write_failures > 0 {
            error!(
                path = %self.path.display(),
                failures = self.write_failures,
                "Binary output is incomplete"
            );
        }
        let file = writer.into_inner().map_err(|e| {
            let err = VizError::output(&self.path, e.into_error());
            error!("{err}");
            err
        })?;
        file.sync_all().map_err(|e| {
            let err = VizError::output(&self.path, e);
            error!("{err}");
            err
        })?;
        info!(
            path = %self.path.display(),
            records = self.records_written,
            "Binary output closed"
        );
        Ok(())
    }
}

impl RecordListener for BinaryEncoder {
    fn on_begin(&mut self, device: &str) {
        debug!(device, offset = self.records_written, "Appending device records");
    }

    fn on_record(&mut self, record: &TimeSeriesRecord) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        match self.layout.encode(record, writer) {
            Ok(()) => self.records_written += 1,
            Err(e) => {
                if self.write_failures == 0 {
                    error!(path = %self.path.display(), error = %e, "Failed to write binary record");
                }
                self.write_failures += 1;
            }
        }
    }

    fn on_end(&mut self, _num_records: usize) {}
}

impl Drop for BinaryEncoder {
    fn drop(&mut self) {
        if self.writer.is_some() {
            let _ = self.finish();
        }
    }
}
