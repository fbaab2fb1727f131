// Training trace
// Append-only JSONL record of a training run, usable as a training monitor

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::monitor::{CancelFlag, TrainingMonitor};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One line of the training trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,

    /// "started" or "epoch"
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,

    pub message: String,
}

impl TraceEntry {
    pub fn new(event: impl Into<String>, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            event: event.into(),
            epoch: None,
            error: None,
            message: message.into(),
        }
    }

    pub fn epoch(epoch: usize, error: f64) -> Self {
        TraceEntry {
            epoch: Some(epoch),
            error: Some(error),
            ..TraceEntry::new("epoch", format!("epoch {} error {:.6}", epoch, error))
        }
    }

    /// Serialize to a JSON line, newline included
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends trace entries to a file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append an entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.write_all(entry.to_json_line()?.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read back every entry of a trace file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        entries.push(serde_json::from_str(line)?);
    }

    Ok(entries)
}

/// Training monitor writing progress to a trace file
///
/// Write failures are logged and never interrupt training.
pub struct TraceMonitor {
    writer: TraceWriter,
    period: usize,
    cancel: CancelFlag,
    samples: Cell<usize>,
}

impl TraceMonitor {
    pub fn new(file_path: PathBuf, period: usize) -> Self {
        TraceMonitor {
            writer: TraceWriter::new(file_path),
            period: period.max(1),
            cancel: CancelFlag::new(),
            samples: Cell::new(0),
        }
    }

    /// Stop training when `cancel` is set
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Samples reported through `sample_processed`
    pub fn samples_seen(&self) -> usize {
        self.samples.get()
    }

    fn record(&self, entry: TraceEntry) {
        if let Err(e) = self.writer.write(&entry) {
            log::warn!("Cannot write training trace {:?}: {}", self.writer.path(), e);
        }
    }
}

impl TrainingMonitor for TraceMonitor {
    fn training_started(&self, samples: usize, epochs: usize) {
        self.record(TraceEntry::new(
            "started",
            format!("{} samples, up to {} epochs", samples, epochs),
        ));
    }

    fn sample_processed(&self, _source: &str) {
        self.samples.set(self.samples.get() + 1);
    }

    fn epoch_completed(&self, epoch: usize, error: f64) {
        self.record(TraceEntry::epoch(epoch, error));
    }

    fn epoch_period(&self) -> usize {
        self.period
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }
}
