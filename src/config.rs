//! Configuration management.
//!
//! Settings are layered with `figment`, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables prefixed with `SENSOR_VIZ_` (e.g. `SENSOR_VIZ_PROFILE=speck`)
//! 4. command-line overrides
//!
//! A validated [`Settings`] plus the three run paths resolve into a [`RunPlan`], which is all
//! the pipeline needs to know.
//!
//! # Example
//! ```no_run
//! use sensor_viz::config::Settings;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(Some(Path::new("config/sensor_viz.toml")))?;
//! let plan = settings.plan("devices.csv", "csv", "out")?;
//! println!("Metadata: {}", plan.metadata_path.display());
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, VizError};
use crate::logging::{parse_log_level, OutputFormat};
use crate::profile::{DatasetProfile, TIME_SERIES_EXTENSION};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables read into [`Settings`].
pub const ENV_PREFIX: &str = "SENSOR_VIZ_";

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
    /// Log span close events with their durations
    #[serde(default)]
    pub log_span_events: bool,
    /// Include source file and line number in log events
    #[serde(default)]
    pub log_source_location: bool,
    /// Sensor family of the roster and time-series files
    #[serde(default)]
    pub profile: DatasetProfile,
    /// Sample interval written to the metadata; the profile's interval when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_interval_secs: Option<u32>,
    /// Metadata file name inside the output directory; the profile's name when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,
    /// Binary file name inside the output directory; the profile's name when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
            log_span_events: false,
            log_source_location: false,
            profile: DatasetProfile::default(),
            value_interval_secs: None,
            metadata_file: None,
            binary_file: None,
        }
    }
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    /// `--log-level`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// `--log-format`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<OutputFormat>,
    /// `--log-spans`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_span_events: Option<bool>,
    /// `--log-source`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_source_location: Option<bool>,
    /// `--profile`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<DatasetProfile>,
    /// Positional `INTERVAL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_interval_secs: Option<u32>,
    /// `--metadata-file`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,
    /// `--binary-file`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_file: Option<String>,
}

impl Settings {
    /// The layered figment without command-line overrides.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load and validate settings from defaults, `config_file` and the environment.
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        Self::load_with(config_file, SettingsOverrides::default())
    }

    /// Like [`Settings::load`], with command-line overrides applied last.
    pub fn load_with(config_file: Option<&Path>, overrides: SettingsOverrides) -> AppResult<Self> {
        if let Some(path) = config_file {
            if !path.is_file() {
                return Err(VizError::Configuration(format!(
                    "Config file does not exist: {}",
                    path.display()
                )));
            }
        }
        let settings: Settings = Self::figment(config_file)
            .merge(Serialized::defaults(overrides))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        parse_log_level(&self.log_level).map_err(VizError::Configuration)?;

        if self.value_interval_secs == Some(0) {
            return Err(VizError::Configuration(
                "value_interval_secs must be greater than 0".into(),
            ));
        }

        for (key, name) in [
            ("metadata_file", &self.metadata_file),
            ("binary_file", &self.binary_file),
        ] {
            if let Some(name) = name {
                if name.trim().is_empty() || name.contains(['/', '\\', '\0']) {
                    return Err(VizError::Configuration(format!(
                        "Invalid {key} '{name}': must be a plain file name"
                    )));
                }
            }
        }

        if self.metadata_file.is_some() && self.metadata_file == self.binary_file {
            return Err(VizError::Configuration(
                "metadata_file and binary_file must differ".into(),
            ));
        }
        Ok(())
    }

    /// Sample interval recorded in the metadata document.
    pub fn value_interval_secs(&self) -> u32 {
        self.value_interval_secs
            .unwrap_or_else(|| self.profile.default_value_interval_secs())
    }

    /// Resolves the run paths against these settings.
    ///
    /// Fails when the roster is not a file or the input directory is not a directory. The
    /// output directory is not touched here; see [`RunPlan::prepare_output_dir`].
    pub fn plan(
        &self,
        roster: impl Into<PathBuf>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> AppResult<RunPlan> {
        let roster = roster.into();
        let input_dir = input_dir.into();
        let output_dir = output_dir.into();

        if !roster.is_file() {
            return Err(VizError::Configuration(format!(
                "The specified {} devices file is invalid. It is either not a file, or does not exist: {}",
                self.profile,
                roster.display()
            )));
        }
        if !input_dir.is_dir() {
            return Err(VizError::Configuration(format!(
                "The specified input directory is invalid. It is either not a directory, or does not exist: {}",
                input_dir.display()
            )));
        }

        let metadata_file = self
            .metadata_file
            .as_deref()
            .unwrap_or_else(|| self.profile.default_metadata_file());
        let binary_file = self
            .binary_file
            .as_deref()
            .unwrap_or_else(|| self.profile.default_binary_file());

        Ok(RunPlan {
            metadata_path: output_dir.join(metadata_file),
            binary_path: output_dir.join(binary_file),
            roster,
            input_dir,
            output_dir,
            profile: self.profile,
            value_interval_secs: self.value_interval_secs(),
        })
    }
}

/// Fully resolved inputs and outputs of one conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    /// Device roster file.
    pub roster: PathBuf,
    /// Directory holding the `<device>.csv` files.
    pub input_dir: PathBuf,
    /// Directory receiving both outputs.
    pub output_dir: PathBuf,
    /// Dataset profile of the inputs.
    pub profile: DatasetProfile,
    /// Sample interval written to the metadata.
    pub value_interval_secs: u32,
    /// Full path of the metadata document.
    pub metadata_path: PathBuf,
    /// Full path of the binary blob.
    pub binary_path: PathBuf,
}

impl RunPlan {
    /// Time-series file expected for `device`.
    pub fn input_file(&self, device: &str) -> PathBuf {
        self.input_dir
            .join(format!("{device}.{TIME_SERIES_EXTENSION}"))
    }

    /// Creates the output directory if it does not exist yet.
    pub fn prepare_output_dir(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            VizError::Configuration(format!(
                "Cannot create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;
        if !self.output_dir.is_dir() {
            return Err(VizError::Configuration(format!(
                "The specified output directory is invalid. It is either not a directory, or does not exist: {}",
                self.output_dir.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_follow_profile() {
        let settings = Settings::default();
        assert_eq!(settings.profile, DatasetProfile::AirNow);
        assert_eq!(settings.value_interval_secs(), 3600);

        let speck = Settings {
            profile: DatasetProfile::Speck,
            ..Settings::default()
        };
        assert_eq!(speck.value_interval_secs(), 1);
    }

    #[test]
    fn file_env_and_overrides_layer_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "viz.toml",
                r#"
                profile = "speck"
                log_level = "debug"
                value_interval_secs = 5
                "#,
            )?;
            jail.set_env("SENSOR_VIZ_VALUE_INTERVAL_SECS", "60");
            jail.set_env("SENSOR_VIZ_LOG_SPAN_EVENTS", "true");

            let settings = Settings::load(Some(Path::new("viz.toml"))).unwrap();
            assert_eq!(settings.profile, DatasetProfile::Speck);
            assert_eq!(settings.log_level, "debug");
            assert_eq!(settings.value_interval_secs, Some(60));
            assert!(settings.log_span_events);
            assert!(!settings.log_source_location);

            let overridden = Settings::load_with(
                Some(Path::new("viz.toml")),
                SettingsOverrides {
                    value_interval_secs: Some(120),
                    binary_file: Some("grid.bin".into()),
                    log_source_location: Some(true),
                    ..SettingsOverrides::default()
                },
            )
            .unwrap();
            assert_eq!(overridden.value_interval_secs(), 120);
            assert_eq!(overridden.binary_file.as_deref(), Some("grid.bin"));
            assert_eq!(overridden.profile, DatasetProfile::Speck);
            assert!(overridden.log_source_location);
            Ok(())
        });
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = Settings::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(VizError::Configuration(_))));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_level = Settings {
            log_level: "loud".into(),
            ..Settings::default()
        };
        assert!(bad_level.validate().is_err());

        let zero_interval = Settings {
            value_interval_secs: Some(0),
            ..Settings::default()
        };
        assert!(zero_interval.validate().is_err());

        let nested = Settings {
            metadata_file: Some("../meta.json".into()),
            ..Settings::default()
        };
        assert!(nested.validate().is_err());

        let clash = Settings {
            metadata_file: Some("out.dat".into()),
            binary_file: Some("out.dat".into()),
            ..Settings::default()
        };
        assert!(clash.validate().is_err());
    }

    #[test]
    fn plan_resolves_default_output_names() {
        let dir = tempfile::tempdir().unwrap();
        let roster = dir.path().join("devices.csv");
        std::fs::write(&roster, "h\n").unwrap();

        let plan = Settings::default()
            .plan(&roster, dir.path(), dir.path().join("out"))
            .unwrap();
        assert_eq!(plan.metadata_path, dir.path().join("out/airnow_metadata.json"));
        assert_eq!(plan.binary_path, dir.path().join("out/airnow_data.bin"));
        assert_eq!(plan.input_file("A"), dir.path().join("A.csv"));

        plan.prepare_output_dir().unwrap();
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn plan_rejects_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        assert!(settings
            .plan(dir.path().join("none.csv"), dir.path(), dir.path())
            .is_err());

        let roster = dir.path().join("devices.csv");
        std::fs::write(&roster, "h\n").unwrap();
        assert!(settings
            .plan(&roster, dir.path().join("missing"), dir.path())
            .is_err());
    }
}
