//! Sinks for non-ECF findings.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use ecf_core::types::Address;

use crate::error::CheckerError;

/// One recursive call that could not be reordered away.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NonEcfReport {
    pub transaction_id: u64,
    pub origin: Address,
    pub block: u64,
    /// Block timestamp (Unix seconds).
    pub time: u64,
    pub contract: Address,
    pub depth: usize,
    pub start_index: usize,
    pub length: usize,
    pub detected_at: DateTime<Utc>,
}

/// Destination for [`NonEcfReport`]s.
pub trait ReportSink: Send {
    fn record(&mut self, report: &NonEcfReport) -> Result<(), CheckerError>;

    /// Highest transaction id recorded by a previous run, so ids keep
    /// increasing across runs. Default: no history.
    fn last_transaction_id(&self) -> Result<Option<u64>, CheckerError> {
        Ok(None)
    }
}

/// Shared in-memory sink. Clones see the same reports.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<NonEcfReport>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<NonEcfReport> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ReportSink for MemorySink {
    fn record(&mut self, report: &NonEcfReport) -> Result<(), CheckerError> {
        self.reports.lock().push(report.clone());
        Ok(())
    }

    fn last_transaction_id(&self) -> Result<Option<u64>, CheckerError> {
        Ok(self.reports.lock().iter().map(|r| r.transaction_id).max())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    /// Create the sink, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CheckerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CheckerError::Io(e.to_string()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All reports in the file, oldest first.
    pub fn read_all(&self) -> Result<Vec<NonEcfReport>, CheckerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| CheckerError::Io(e.to_string()))?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(|e| CheckerError::Serialization(e.to_string())))
            .collect()
    }
}

impl ReportSink for JsonLinesSink {
    fn record(&mut self, report: &NonEcfReport) -> Result<(), CheckerError> {
        let line = serde_json::to_string(report).map_err(|e| CheckerError::Serialization(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CheckerError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| CheckerError::Io(e.to_string()))
    }

    fn last_transaction_id(&self) -> Result<Option<u64>, CheckerError> {
        Ok(self.read_all()?.iter().map(|r| r.transaction_id).max())
    }
}

/// Default report file under the platform data directory.
pub fn default_report_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ecf")
        .join("non_ecf_reports.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: u64) -> NonEcfReport {
        NonEcfReport {
            transaction_id: id,
            origin: Address([1; 20]),
            block: 7,
            time: 1_500_000_000,
            contract: Address([2; 20]),
            depth: 2,
            start_index: 1,
            length: 4,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn memory_sink_clones_share_reports() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.record(&report(3)).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.last_transaction_id().unwrap(), Some(3));
    }

    #[test]
    fn json_lines_appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::open(dir.path().join("nested").join("reports.jsonl")).unwrap();
        sink.record(&report(5)).unwrap();
        sink.record(&report(9)).unwrap();
        let all = sink.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], report_with_time(9, all[1].detected_at));
        assert_eq!(sink.last_transaction_id().unwrap(), Some(9));
    }

    fn report_with_time(id: u64, at: DateTime<Utc>) -> NonEcfReport {
        NonEcfReport { detected_at: at, ..report(id) }
    }

    #[test]
    fn missing_file_has_no_history() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::open(dir.path().join("none.jsonl")).unwrap();
        assert_eq!(sink.last_transaction_id().unwrap(), None);
    }

    #[test]
    fn corrupt_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "not json\n").unwrap();
        let sink = JsonLinesSink::open(&path).unwrap();
        assert!(matches!(sink.read_all(), Err(CheckerError::Serialization(_))));
    }

    #[test]
    fn default_path_file_name() {
        assert!(default_report_path().ends_with("ecf/non_ecf_reports.jsonl"));
    }
}
