//! Per-device summary statistics and the metadata document.
//!
//! [`StatisticsAggregator`] consumes the typed record stream one device at a time. For each
//! device it tracks the time range, the value extrema with the time they were seen, and the
//! record count. When a device's stream ends the device is looked up in the
//! [`DeviceDirectory`]:
//!
//! - found: a [`DeviceSummary`] is frozen with the current cumulative record offset, and the
//!   offset then advances by the device's record count;
//! - not found: everything accumulated for the device is discarded and the offset is left
//!   untouched.
//!
//! The offset therefore indexes the device's first record in the shared binary blob.
//!
//! # Extremum ties
//!
//! Extrema use non-strict comparisons (`value <= min`, `value >= max`), so when a value equals
//! the current extremum the later record wins and its timestamp is kept.

use crate::core::{RecordListener, SensorValue, TimeSeriesRecord, ValueDomain};
use crate::devices::DeviceDirectory;
use crate::error::{AppResult, VizError};
use crate::profile::DatasetProfile;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::value::RawValue;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Lifecycle of the device currently being aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorPhase {
    /// No device has started yet.
    Idle,
    /// Records of a device are being folded in.
    Accumulating,
    /// The last device's stream ended and its summary (if any) is frozen.
    Finalized,
}

/// Running extrema for one device.
#[derive(Debug, Clone)]
struct RunningStats {
    device: String,
    min_time: i32,
    max_time: i32,
    min_value: SensorValue,
    max_value: SensorValue,
    min_value_time: i32,
    max_value_time: i32,
}

impl RunningStats {
    fn new(device: &str, domain: ValueDomain) -> Self {
        Self {
            device: device.to_string(),
            min_time: i32::MAX,
            max_time: i32::MIN,
            min_value: SensorValue::ceiling(domain),
            max_value: SensorValue::floor(domain),
            min_value_time: 0,
            max_value_time: 0,
        }
    }

    fn update(&mut self, record: &TimeSeriesRecord) {
        self.min_time = self.min_time.min(record.timestamp);
        self.max_time = self.max_time.max(record.timestamp);
        if record.value.total_cmp(&self.min_value) != Ordering::Greater {
            self.min_value = record.value;
            self.min_value_time = record.timestamp;
        }
        if record.value.total_cmp(&self.max_value) != Ordering::Less {
            self.max_value = record.value;
            self.max_value_time = record.timestamp;
        }
    }
}

/// Frozen statistics of one device, serialized as one entry of the `devices` array.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    /// Device identifier.
    pub name: String,
    /// Display name from the roster.
    pub pretty_name: Option<String>,
    /// First coordinate, verbatim from the roster.
    pub latitude: String,
    /// Second coordinate, verbatim from the roster.
    pub longitude: String,
    /// Free-text location from the roster.
    pub location_details: Option<String>,
    /// JSON key names for `latitude` and `longitude`.
    pub coordinate_keys: (&'static str, &'static str),
    /// Earliest timestamp.
    pub min_time: i32,
    /// Latest timestamp.
    pub max_time: i32,
    /// Smallest value.
    pub min_value: SensorValue,
    /// Largest value.
    pub max_value: SensorValue,
    /// Timestamp of the last record holding `min_value`.
    pub min_value_time: i32,
    /// Timestamp of the last record holding `max_value`.
    pub max_value_time: i32,
    /// Records accepted from the device's file.
    pub num_records: usize,
    /// Index of the device's first record in the binary blob.
    pub record_offset: usize,
}

/// A roster coordinate, written as a bare JSON number when its text is one.
struct Coordinate<'a>(&'a str);

impl Serialize for Coordinate<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match serde_json::from_str::<&RawValue>(self.0) {
            Ok(raw) if raw.get().starts_with(|c: char| c == '-' || c.is_ascii_digit()) => {
                raw.serialize(serializer)
            }
            _ => serializer.serialize_str(self.0),
        }
    }
}

impl Serialize for DeviceSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        if let Some(pretty_name) = &self.pretty_name {
            map.serialize_entry("prettyName", pretty_name)?;
        }
        map.serialize_entry(self.coordinate_keys.0, &Coordinate(&self.latitude))?;
        map.serialize_entry(self.coordinate_keys.1, &Coordinate(&self.longitude))?;
        if let Some(details) = &self.location_details {
            map.serialize_entry("locationDetails", details)?;
        }
        map.serialize_entry("minTime", &self.min_time)?;
        map.serialize_entry("maxTime", &self.max_time)?;
        map.serialize_entry("minValue", &self.min_value)?;
        map.serialize_entry("maxValue", &self.max_value)?;
        map.serialize_entry("minValueTime", &self.min_value_time)?;
        map.serialize_entry("maxValueTime", &self.max_value_time)?;
        map.serialize_entry("numRecords", &self.num_records)?;
        map.serialize_entry("recordOffset", &self.record_offset)?;
        map.end()
    }
}

/// The single metadata document written at the end of a run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument<'a> {
    /// Nominal spacing between records, in seconds.
    pub value_interval_secs: u32,
    /// Per-device summaries in processing order.
    pub devices: &'a [DeviceSummary],
}

/// Builds per-device summaries and writes the metadata document.
pub struct StatisticsAggregator<'d> {
    directory: &'d DeviceDirectory,
    profile: DatasetProfile,
    value_interval_secs: u32,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    phase: AggregatorPhase,
    current: Option<RunningStats>,
    summaries: Vec<DeviceSummary>,
    record_offset: usize,
    devices_not_found: usize,
}

impl<'d> StatisticsAggregator<'d> {
    /// Creates (truncating) the metadata output. Called once per run.
    pub fn create(
        path: impl Into<PathBuf>,
        directory: &'d DeviceDirectory,
        profile: DatasetProfile,
        value_interval_secs: u32,
    ) -> AppResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| VizError::output(&path, e))?;
        info!(path = %path.display(), "Metadata output opened");
        Ok(Self {
            directory,
            profile,
            value_interval_secs,
            path,
            writer: Some(BufWriter::new(file)),
            phase: AggregatorPhase::Idle,
            current: None,
            summaries: Vec::with_capacity(directory.len()),
            record_offset: 0,
            devices_not_found: 0,
        })
    }

    /// Lifecycle state of the current device.
    pub fn phase(&self) -> AggregatorPhase {
        self.phase
    }

    /// Offset the next found device will receive.
    pub fn record_offset(&self) -> usize {
        self.record_offset
    }

    /// Summaries frozen so far, in processing order.
    pub fn summaries(&self) -> &[DeviceSummary] {
        &self.summaries
    }

    /// Devices whose statistics were discarded because the directory did not know them.
    pub fn devices_not_found(&self) -> usize {
        self.devices_not_found
    }

    /// Writes the metadata document and closes the output.
    ///
    /// Failures are logged and returned. A failed write may leave a truncated document on disk.
    pub fn finish(&mut self) -> AppResult<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        let document = MetadataDocument {
            value_interval_secs: self.value_interval_secs,
            devices: &self.summaries,
        };

        let result = serde_json::to_writer(&mut writer, &document)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush())
            .and_then(|()| writer.get_ref().sync_all());

        match result {
            Ok(()) => {
                info!(
                    path = %self.path.display(),
                    devices = self.summaries.len(),
                    records = self.record_offset,
                    "Metadata written"
                );
                Ok(())
            }
            Err(e) => {
                let err = VizError::output(&self.path, e);
                error!("{err}");
                Err(err)
            }
        }
    }
}

impl RecordListener for StatisticsAggregator<'_> {
    fn on_begin(&mut self, device: &str) {
        self.current = Some(RunningStats::new(device, self.profile.value_domain()));
        self.phase = AggregatorPhase::Accumulating;
    }

    fn on_record(&mut self, record: &TimeSeriesRecord) {
        match self.current.as_mut() {
            Some(stats) => stats.update(record),
            None => debug!("Record received outside of a device stream, ignoring"),
        }
    }

    fn on_end(&mut self, num_records: usize) {
        self.phase = AggregatorPhase::Finalized;
        let Some(stats) = self.current.take() else {
            return;
        };

        let Some(device) = self.directory.find(&stats.device) else {
            self.devices_not_found += 1;
            warn!("{}; discarding its statistics", VizError::DeviceNotFound(stats.device));
            return;
        };

        let (lat_key, lon_key) = self.profile.coordinate_keys();
        self.summaries.push(DeviceSummary {
            name: stats.device,
            pretty_name: device.pretty_name.clone(),
            latitude: device.latitude.clone(),
            longitude: device.longitude.clone(),
            location_details: device.location_details.clone(),
            coordinate_keys: (lat_key, lon_key),
            min_time: stats.min_time,
            max_time: stats.max_time,
            min_value: stats.min_value,
            max_value: stats.max_value,
            min_value_time: stats.min_value_time,
            max_value_time: stats.max_value_time,
            num_records,
            record_offset: self.record_offset,
        });
        self.record_offset += num_records;
    }
}
