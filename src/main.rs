//! CLI Entry Point for sensor-viz
//!
//! Converts a directory of per-device CSV files into a metadata document and a binary blob.
//!
//! # Usage
//!
//! ```bash
//! sensor-viz --profile airnow airnow_devices.csv csv/ out/
//! sensor-viz --profile speck speck_devices.csv csv/ out/ 1 --binary-file grid.bin
//! ```

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use sensor_viz::config::{Settings, SettingsOverrides};
use sensor_viz::logging::{self, OutputFormat};
use sensor_viz::{pipeline, DatasetProfile};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensor-viz")]
#[command(about = "Convert sensor time-series CSV files into visualization metadata and binary data", long_about = None)]
struct Cli {
    /// Device roster file (CSV with a header row)
    roster: PathBuf,

    /// Directory holding one `<device>.csv` file per device
    input_dir: PathBuf,

    /// Directory for the metadata and binary outputs (created if absent)
    output_dir: PathBuf,

    /// Sample interval in seconds recorded in the metadata
    interval: Option<u32>,

    /// Dataset profile of the roster and time-series files
    #[arg(long, value_enum)]
    profile: Option<DatasetProfile>,

    /// Metadata file name inside the output directory
    #[arg(long)]
    metadata_file: Option<String>,

    /// Binary file name inside the output directory
    #[arg(long)]
    binary_file: Option<String>,

    /// Optional TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<OutputFormat>,

    /// Log per-device span durations
    #[arg(long)]
    log_spans: bool,

    /// Include source file and line in log events
    #[arg(long)]
    log_source: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            log_span_events: self.log_spans.then_some(true),
            log_source_location: self.log_source.then_some(true),
            profile: self.profile,
            value_interval_secs: self.interval,
            metadata_file: self.metadata_file.clone(),
            binary_file: self.binary_file.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_with(cli.config.as_deref(), cli.overrides())
        .context("Failed to load settings")?;
    logging::init_from_settings(&settings).map_err(|e| anyhow!(e))?;

    let plan = settings
        .plan(&cli.roster, &cli.input_dir, &cli.output_dir)
        .context("Invalid arguments")?;

    println!("📡 sensor-viz ({} profile)", plan.profile);
    println!("   Devices File:          {}", plan.roster.display());
    println!("   CSV Input Directory:   {}", plan.input_dir.display());
    println!("   Data Output Directory: {}", plan.output_dir.display());
    println!();

    let summary = pipeline::run(&plan).context("Conversion failed")?;

    println!(
        "✅ Wrote {} of {} devices ({} records)",
        summary.devices_written, summary.devices_in_roster, summary.records_written
    );
    if summary.devices_written > 0 {
        println!("   Metadata: {}", plan.metadata_path.display());
        println!("   Binary:   {}", plan.binary_path.display());
    }
    Ok(())
}
