//! Dataset profiles.
//!
//! Every sensor family the converter understands is one variant of [`DatasetProfile`].
//! A profile carries all of the dataset-specific constants: the numeric domain of the
//! readings, the binary record layout, the roster column mapping, the JSON key names used
//! for the device coordinates, the nominal sample interval, and default output names.

use crate::core::ValueDomain;
use crate::data::binary::BinaryLayout;
use crate::devices::{self, Device};
use serde::{Deserialize, Serialize};

/// File extension of the per-device time-series files.
pub const TIME_SERIES_EXTENSION: &str = "csv";

/// Minimum number of fields a time-series row must have (timestamp, value).
pub const TIME_SERIES_MIN_FIELDS: usize = 2;

/// A sensor family with its own roster layout and value encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetProfile {
    /// Speck particle counters placed on a grid; integer counts sampled every second.
    Speck,
    /// AirNow monitoring stations; floating concentrations sampled hourly.
    #[default]
    #[value(name = "airnow")]
    AirNow,
}

impl DatasetProfile {
    /// Short lowercase name, as used on the command line and in config files.
    pub fn name(self) -> &'static str {
        match self {
            DatasetProfile::Speck => "speck",
            DatasetProfile::AirNow => "airnow",
        }
    }

    /// Numeric domain of the value column.
    pub fn value_domain(self) -> ValueDomain {
        match self {
            DatasetProfile::Speck => ValueDomain::Integer,
            DatasetProfile::AirNow => ValueDomain::Floating,
        }
    }

    /// Binary record layout written for this dataset.
    pub fn binary_layout(self) -> BinaryLayout {
        match self.value_domain() {
            ValueDomain::Integer => BinaryLayout::TimeAndInt,
            ValueDomain::Floating => BinaryLayout::TimeAndScaledShort,
        }
    }

    /// Minimum number of fields a roster row must have to be considered.
    pub fn roster_min_fields(self) -> usize {
        match self {
            DatasetProfile::Speck => 4,
            DatasetProfile::AirNow => 6,
        }
    }

    /// Maps one roster row onto a device.
    pub fn map_roster_row(self, fields: &[&str]) -> Option<Device> {
        match self {
            DatasetProfile::Speck => devices::speck_device(fields),
            DatasetProfile::AirNow => devices::airnow_device(fields),
        }
    }

    /// JSON keys for the two coordinates in a device's metadata fragment.
    ///
    /// Speck devices sit on a grid, so their coordinates are a row and a column.
    pub fn coordinate_keys(self) -> (&'static str, &'static str) {
        match self {
            DatasetProfile::Speck => ("row", "col"),
            DatasetProfile::AirNow => ("latitude", "longitude"),
        }
    }

    /// Nominal spacing between consecutive records, in seconds.
    pub fn default_value_interval_secs(self) -> u32 {
        match self {
            DatasetProfile::Speck => 1,
            DatasetProfile::AirNow => 3600,
        }
    }

    /// Default file name of the metadata document.
    pub fn default_metadata_file(self) -> &'static str {
        match self {
            DatasetProfile::Speck => "speck_12x12_metadata.json",
            DatasetProfile::AirNow => "airnow_metadata.json",
        }
    }

    /// Default file name of the binary record blob.
    pub fn default_binary_file(self) -> &'static str {
        match self {
            DatasetProfile::Speck => "speck_12x12_data.bin",
            DatasetProfile::AirNow => "airnow_data.bin",
        }
    }
}

impl std::fmt::Display for DatasetProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
