//! Custom error types for the application.
//!
//! This module defines the primary error type, `VizError`, for the whole conversion run.
//! Using the `thiserror` crate, it provides a centralized and consistent way to describe
//! what can go wrong between reading a device roster and closing the last output file.
//!
//! ## Error Hierarchy
//!
//! `VizError` consolidates the failure classes of a run:
//!
//! - **`Config`** / **`Configuration`**: the settings could not be loaded, or loaded but are
//!   semantically invalid (unknown log level, missing roster, zero sample interval). Fatal:
//!   these abort the run before any device is processed.
//! - **`MissingInputFile`**: a device in the roster has no time-series file. The device is
//!   skipped and the run continues.
//! - **`RecordParse`**: a single row's timestamp or value did not parse. The row is dropped.
//! - **`DeviceNotFound`**: a device finished streaming but is not in the directory. Its
//!   statistics are discarded and it consumes no record offset.
//! - **`OutputIo`**: writing or closing the metadata or binary output failed. Logged; partial
//!   files are left on disk as they are.
//! - **`Io`**, **`Csv`**, **`Json`**: wrapped lower-level errors.
//!
//! Use [`VizError::is_recoverable`] to decide whether a failure ends the run.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, VizError>;

/// Every failure a conversion run can report.
#[derive(Error, Debug)]
pub enum VizError {
    /// Settings could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Settings or run paths are invalid.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// An input file could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input file failed part-way through.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Metadata serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A roster device has no time-series file.
    #[error("Input file for device '{device}' not found: {}", .path.display())]
    MissingInputFile {
        /// Device identifier.
        device: String,
        /// Expected file location.
        path: PathBuf,
    },

    /// A row's timestamp or value did not parse.
    #[error("Failed to parse record on line {line} [{raw}]: {reason}")]
    RecordParse {
        /// Physical line number.
        line: u64,
        /// Row text.
        raw: String,
        /// Which field failed, and why.
        reason: String,
    },

    /// A streamed device is not in the roster.
    #[error("Device '{0}' is not in the device directory")]
    DeviceNotFound(String),

    /// Writing or closing an output failed.
    #[error("Failed to write output {}: {source}", .path.display())]
    OutputIo {
        /// The output file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl From<figment::Error> for VizError {
    fn from(value: figment::Error) -> Self {
        VizError::Config(Box::new(value))
    }
}

impl VizError {
    /// Whether the run may continue after this error.
    ///
    /// Configuration problems (including an unreadable roster, which surfaces as `Io` or
    /// `Csv` before any device is touched) are fatal. Everything scoped to a single row,
    /// device, or output write is recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            VizError::Config(_)
            | VizError::Configuration(_)
            | VizError::Io(_)
            | VizError::Csv(_)
            | VizError::Json(_) => false,
            VizError::MissingInputFile { .. }
            | VizError::RecordParse { .. }
            | VizError::DeviceNotFound(_)
            | VizError::OutputIo { .. } => true,
        }
    }

    /// Wraps an I/O failure against a specific output file.
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VizError::OutputIo {
            path: path.into(),
            source,
        }
    }
}
