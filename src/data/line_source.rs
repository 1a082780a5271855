//! Single-pass reader for delimited text files.
//!
//! A [`LineSource`] opens one file, streams it exactly once, and pushes begin/header/line/end
//! events to every registered [`LineListener`]. Every listener sees an event before the next
//! row is read, so memory use is bounded by one row regardless of file size.
//!
//! # Row filtering
//! - The first row is the header when one was requested; it is never counted.
//! - Rows that are blank after trimming are dropped.
//! - Rows with fewer than `min_fields` fields are dropped.
//!
//! Dropped rows are not counted in the `num_lines` passed to `on_end`.
//!
//! Fields are split on the delimiter of each physical line. Quote characters carry no
//! meaning, and invalid UTF-8 is replaced with U+FFFD, so a damaged row never spills into
//! the rows after it.

use crate::core::{LineListener, LineRecord};
use crate::error::AppResult;
use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{debug, error, trace};

/// Field delimiter of the per-device time-series files.
pub const COMMA_DELIMITER: u8 = b',';

/// Streams one delimited text file to a set of listeners.
pub struct LineSource<'a> {
    path: PathBuf,
    has_header: bool,
    min_fields: usize,
    delimiter: u8,
    listeners: Vec<&'a mut dyn LineListener>,
}

impl<'a> LineSource<'a> {
    /// Creates a comma-delimited source.
    pub fn new(path: impl Into<PathBuf>, has_header: bool, min_fields: usize) -> Self {
        Self {
            path: path.into(),
            has_header,
            min_fields,
            delimiter: COMMA_DELIMITER,
            listeners: Vec::new(),
        }
    }

    /// Set field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Registers a listener. Listeners are invoked in registration order.
    pub fn add_listener(&mut self, listener: &'a mut dyn LineListener) {
        self.listeners.push(listener);
    }

    /// Streams the file, returning the number of accepted rows.
    ///
    /// If the file cannot be opened, [`VizError::Io`](crate::error::VizError::Io) is returned
    /// and no event is emitted. A read failure part-way through still emits `on_end` with the
    /// rows accepted so far, then returns [`VizError::Csv`](crate::error::VizError::Csv), so
    /// listeners never see a begin without an end.
    pub fn read(&mut self) -> AppResult<usize> {
        let file = File::open(&self.path).map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Failed to open file, read aborted");
            e
        })?;
        debug!(path = %self.path.display(), "Streaming file");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .quoting(false)
            .delimiter(self.delimiter)
            .from_reader(BufReader::new(file));

        for listener in self.listeners.iter_mut() {
            listener.on_begin(&self.path);
        }

        let mut header_pending = self.has_header;
        let mut num_lines = 0usize;
        let mut failure = None;

        for result in reader.byte_records() {
            let bytes = match result {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "Read failed part-way through file");
                    failure = Some(e);
                    break;
                }
            };
            let line = bytes.position().map_or(0, |p| p.line());
            let mut replaced = false;
            let fields: csv::StringRecord = bytes
                .iter()
                .map(|field| {
                    let text = String::from_utf8_lossy(field);
                    replaced |= matches!(text, Cow::Owned(_));
                    text
                })
                .collect();
            if replaced {
                debug!(line, "Replaced invalid UTF-8 in row");
            }
            let record = LineRecord::new(line, fields, self.delimiter);

            if header_pending {
                header_pending = false;
                for listener in self.listeners.iter_mut() {
                    listener.on_header(&record);
                }
                continue;
            }

            if is_blank(&record) {
                continue;
            }
            if record.len() < self.min_fields {
                trace!(line, fields = record.len(), "Dropping row with too few fields");
                continue;
            }

            for listener in self.listeners.iter_mut() {
                listener.on_line(&record);
            }
            num_lines += 1;
        }

        for listener in self.listeners.iter_mut() {
            listener.on_end(&self.path, num_lines);
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(num_lines),
        }
    }
}

fn is_blank(record: &LineRecord) -> bool {
    record.is_empty() || (record.len() == 1 && record.field(0).is_some_and(str::is_empty))
}
