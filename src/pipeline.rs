//! Run orchestration.
//!
//! One run walks the [`DeviceDirectory`] in identifier order. Each device with a time-series
//! file in the input directory gets its own `LineSource → RecordTranscoder` pipeline, feeding
//! the run-wide [`StatisticsAggregator`] and [`BinaryEncoder`]. Devices are processed strictly
//! one after the other, and each input file is closed before the next device starts.
//!
//! After the last device the aggregator writes the metadata document and the encoder closes
//! the binary blob. Output failures are logged and do not abort the run; whatever was written
//! stays on disk.

use crate::config::RunPlan;
use crate::data::binary::BinaryEncoder;
use crate::data::line_source::LineSource;
use crate::data::stats::StatisticsAggregator;
use crate::data::transcoder::RecordTranscoder;
use crate::devices::{Device, DeviceDirectory};
use crate::error::{AppResult, VizError};
use crate::profile::TIME_SERIES_MIN_FIELDS;
use tracing::{debug, error, info, info_span, warn};

/// Counters describing a finished run. Errors are logged as they happen, not collected here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Devices in the roster.
    pub devices_in_roster: usize,
    /// Devices whose time-series file was streamed.
    pub devices_processed: usize,
    /// Devices without a time-series file.
    pub devices_skipped: usize,
    /// Devices whose time-series file exists but could not be opened.
    pub devices_unreadable: usize,
    /// Devices whose summary was dropped because the directory did not know them.
    pub devices_not_found: usize,
    /// Devices with an entry in the metadata document.
    pub devices_written: usize,
    /// Records appended to the binary blob.
    pub records_written: u64,
}

/// Loads the roster and converts every device in it.
///
/// Only configuration and roster failures are returned as errors. The output directory is
/// always created; an empty roster leaves it without output files.
pub fn run(plan: &RunPlan) -> AppResult<RunSummary> {
    plan.prepare_output_dir()?;
    let directory = DeviceDirectory::load(&plan.roster, plan.profile)?;
    if directory.is_empty() {
        warn!(roster = %plan.roster.display(), "Roster contains no devices, nothing to do");
        return Ok(RunSummary::default());
    }
    process_devices(plan, &directory)
}

/// Streams every device of `directory` that has an input file into the two outputs.
pub fn process_devices(plan: &RunPlan, directory: &DeviceDirectory) -> AppResult<RunSummary> {
    let mut stats = StatisticsAggregator::create(
        &plan.metadata_path,
        directory,
        plan.profile,
        plan.value_interval_secs,
    )?;
    let mut encoder = BinaryEncoder::create(&plan.binary_path, plan.profile.binary_layout())?;

    let mut summary = RunSummary {
        devices_in_roster: directory.len(),
        ..RunSummary::default()
    };

    info!(devices = directory.len(), profile = %plan.profile, "Processing devices");
    for device in directory.iter() {
        match process_device(plan, device, &mut stats, &mut encoder) {
            DeviceOutcome::Processed => summary.devices_processed += 1,
            DeviceOutcome::Skipped => summary.devices_skipped += 1,
            DeviceOutcome::Unreadable => summary.devices_unreadable += 1,
        }
    }

    // both outputs must be closed; failures were already logged
    let _ = stats.finish();
    let _ = encoder.finish();

    summary.devices_not_found = stats.devices_not_found();
    summary.devices_written = stats.summaries().len();
    summary.records_written = encoder.records_written();
    info!(
        written = summary.devices_written,
        skipped = summary.devices_skipped,
        unreadable = summary.devices_unreadable,
        records = summary.records_written,
        "Run complete"
    );
    Ok(summary)
}

/// What happened to one roster device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceOutcome {
    /// The file was streamed, completely or up to a read failure.
    Processed,
    /// No time-series file exists for the device.
    Skipped,
    /// The file exists but could not be opened; no events were emitted.
    Unreadable,
}

impl DeviceOutcome {
    fn of_read(result: &AppResult<usize>) -> Self {
        match result {
            Ok(_) => DeviceOutcome::Processed,
            // open failures surface as plain I/O errors before `on_begin`
            Err(VizError::Io(_)) => DeviceOutcome::Unreadable,
            Err(_) => DeviceOutcome::Processed,
        }
    }
}

/// Runs one device's pipeline.
fn process_device(
    plan: &RunPlan,
    device: &Device,
    stats: &mut StatisticsAggregator<'_>,
    encoder: &mut BinaryEncoder,
) -> DeviceOutcome {
    let path = plan.input_file(&device.name);
    if !path.is_file() {
        let skipped = VizError::MissingInputFile {
            device: device.name.clone(),
            path,
        };
        debug!("{skipped}, skipping");
        return DeviceOutcome::Skipped;
    }

    let span = info_span!("device", id = %device.name);
    let _enter = span.enter();
    info!(file = %path.display(), "Processing");

    let mut transcoder = RecordTranscoder::new(plan.profile.value_domain());
    transcoder.add_listener(stats);
    transcoder.add_listener(encoder);

    let mut source = LineSource::new(&path, true, TIME_SERIES_MIN_FIELDS);
    source.add_listener(&mut transcoder);
    let result = source.read();
    match &result {
        Ok(lines) => debug!(lines, "Finished"),
        Err(e) => error!(error = %e, "Input file could not be fully read"),
    }
    DeviceOutcome::of_read(&result)
}
