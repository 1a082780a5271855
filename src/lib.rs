//! # Sensor Visualization Data Converter
//!
//! This crate turns per-device environmental sensor time-series (one delimited text file per
//! device) into the two compact files a visualization client loads:
//!
//! - a single JSON **metadata** document with per-device statistics and the location of each
//!   device's records inside the binary blob;
//! - a single **binary blob** of fixed-width, big-endian time-series records.
//!
//! Every input file is read exactly once. Each row is parsed, folded into the running
//! statistics and appended to the blob before the next row is read.
//!
//! ## Crate Structure
//!
//! - **`config`**: Layered settings (`figment`) and the resolved `RunPlan`.
//! - **`core`**: Record types and the `LineListener` / `RecordListener` contracts.
//! - **`data`**: The streaming stages: `line_source`, `transcoder`, `stats` and `binary`.
//! - **`devices`**: The device roster and the identifier-ordered `DeviceDirectory`.
//! - **`error`**: The `VizError` enum shared by every stage.
//! - **`logging`**: `tracing-subscriber` initialization.
//! - **`pipeline`**: Orchestrates a whole run over the directory.
//! - **`profile`**: Per-dataset constants (Speck, AirNow).

pub mod config;
pub mod core;
pub mod data;
pub mod devices;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod profile;

pub use config::{RunPlan, Settings};
pub use error::{AppResult, VizError};
pub use pipeline::{run, RunSummary};
pub use profile::DatasetProfile;
