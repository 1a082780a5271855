//! Device roster and directory.
//!
//! The roster file maps device identifiers onto their location. It is read once, through
//! the same [`LineSource`] as the time-series files, into an immutable [`DeviceDirectory`]
//! ordered by identifier. That order drives the order of both outputs.

use crate::core::{LineListener, LineRecord};
use crate::data::line_source::LineSource;
use crate::error::AppResult;
use crate::profile::DatasetProfile;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// A geolocated sensor.
///
/// Coordinates are kept as the exact text found in the roster so that no precision is lost
/// on the way to the metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Identifier; also the stem of the device's time-series file.
    pub name: String,
    /// Optional display name.
    pub pretty_name: Option<String>,
    /// Latitude, or grid row for Speck devices.
    pub latitude: String,
    /// Longitude, or grid column for Speck devices.
    pub longitude: String,
    /// Optional free-text location.
    pub location_details: Option<String>,
}

impl Device {
    /// A device with no display name or location details.
    pub fn new(
        name: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pretty_name: None,
            latitude: latitude.into(),
            longitude: longitude.into(),
            location_details: None,
        }
    }

    /// Sets the display name.
    pub fn with_pretty_name(mut self, pretty_name: impl Into<String>) -> Self {
        self.pretty_name = Some(pretty_name.into());
        self
    }

    /// Sets the free-text location.
    pub fn with_location_details(mut self, details: impl Into<String>) -> Self {
        self.location_details = Some(details.into());
        self
    }
}

fn required(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
}

/// Speck roster row: `name, prettyName, latitude, longitude[, locationDetails]`.
pub fn speck_device(fields: &[&str]) -> Option<Device> {
    let name = required(fields, 0)?;
    let latitude = required(fields, 2)?;
    let longitude = required(fields, 3)?;
    Some(Device {
        name,
        pretty_name: required(fields, 1),
        latitude,
        longitude,
        location_details: required(fields, 4),
    })
}

/// AirNow roster row: latitude and longitude in columns 0 and 1, the site id in column 4.
pub fn airnow_device(fields: &[&str]) -> Option<Device> {
    let name = required(fields, 4)?;
    let latitude = required(fields, 0)?;
    let longitude = required(fields, 1)?;
    Some(Device::new(name, latitude, longitude))
}

/// Immutable identifier → device mapping, iterated in identifier order.
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    devices: BTreeMap<String, Device>,
}

impl DeviceDirectory {
    /// Reads a roster file using the column mapping of `profile`.
    ///
    /// An unreadable roster is an error; rows that do not map onto a device are skipped.
    pub fn load(path: &Path, profile: DatasetProfile) -> AppResult<Self> {
        let mut collector = RosterCollector {
            profile,
            devices: BTreeMap::new(),
        };
        let mut source = LineSource::new(path, true, profile.roster_min_fields());
        source.add_listener(&mut collector);
        source.read()?;

        info!(
            roster = %path.display(),
            profile = %profile,
            devices = collector.devices.len(),
            "Loaded device roster"
        );
        Ok(Self {
            devices: collector.devices,
        })
    }

    /// Whether `name` is a known device. Absence is a normal outcome.
    pub fn find(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the roster produced no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }
}

impl FromIterator<Device> for DeviceDirectory {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }
}

struct RosterCollector {
    profile: DatasetProfile,
    devices: BTreeMap<String, Device>,
}

impl LineListener for RosterCollector {
    fn on_begin(&mut self, _path: &Path) {}

    fn on_line(&mut self, line: &LineRecord) {
        let fields: Vec<&str> = line.fields.iter().collect();
        match self.profile.map_roster_row(&fields) {
            // later rows replace earlier rows with the same identifier
            Some(device) => {
                self.devices.insert(device.name.clone(), device);
            }
            None => debug!(line = line.line, "Skipping roster row without id or coordinates"),
        }
    }
}
