//! Run and chunk reports

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::scheduler::{Chunk, RunMode, RunWindow};

/// Outcome of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Every chunk succeeded, or there was nothing to do
    Completed,
    /// At least one chunk failed and at least one succeeded
    PartialBackfillFailure,
    /// Every chunk failed, or the window could not be resolved
    Failed,
    /// A configuration defect stopped the run
    Aborted,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed | RunStatus::PartialBackfillFailure => 0,
            RunStatus::Failed => 1,
            RunStatus::Aborted => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::PartialBackfillFailure => "partial backfill failure",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// What one chunk did
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub chunk: Chunk,
    /// Documents fetched and parsed
    pub documents: usize,
    pub samples: usize,
    /// Samples dropped by the parsers
    pub rejected: usize,
    /// Rows upserted per table
    pub rows: BTreeMap<String, usize>,
    /// Rows inserted or changed per table
    pub changed: BTreeMap<String, usize>,
    pub error: Option<String>,
}

impl ChunkReport {
    pub fn new(chunk: Chunk) -> Self {
        Self {
            chunk,
            documents: 0,
            samples: 0,
            rejected: 0,
            rows: BTreeMap::new(),
            changed: BTreeMap::new(),
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn record_write(&mut self, table: &str, rows: usize, changed: usize) {
        *self.rows.entry(table.to_string()).or_default() += rows;
        *self.changed.entry(table.to_string()).or_default() += changed;
    }

    pub fn fail(&mut self, error: impl fmt::Display) {
        self.error = Some(error.to_string());
    }
}

/// Per-run summary, printed at the end of every run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dataset: String,
    pub mode: String,
    pub window: Option<RunWindow>,
    pub chunks: Vec<ChunkReport>,
    pub status: RunStatus,
    /// Run-level error, when the run stopped outside a chunk or was aborted
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(dataset: Dataset, mode: RunMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dataset: dataset.to_string(),
            mode: mode.to_string(),
            window: None,
            chunks: Vec::new(),
            status: RunStatus::Completed,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn push(&mut self, report: ChunkReport) {
        self.chunks.push(report);
    }

    pub fn attempted(&self) -> usize {
        self.chunks.len()
    }

    pub fn succeeded(&self) -> usize {
        self.chunks.iter().filter(|c| c.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn rejected(&self) -> usize {
        self.chunks.iter().map(|c| c.rejected).sum()
    }

    /// Rows upserted per table over all chunks
    pub fn rows_written(&self) -> BTreeMap<String, usize> {
        let mut totals = BTreeMap::new();
        for chunk in &self.chunks {
            for (table, rows) in &chunk.rows {
                *totals.entry(table.clone()).or_default() += *rows;
            }
        }
        totals
    }

    fn rows_changed(&self, table: &str) -> usize {
        self.chunks.iter().filter_map(|c| c.changed.get(table)).sum()
    }

    /// Stop the run on a configuration defect
    pub fn abort(&mut self, error: impl fmt::Display) {
        self.error = Some(error.to_string());
        self.status = RunStatus::Aborted;
        self.finished_at = Some(Utc::now());
    }

    /// Stop the run before any chunk could start
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.error = Some(error.to_string());
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Derive the status from the chunk outcomes
    pub fn finish(&mut self) {
        self.status = if self.failed() == 0 {
            RunStatus::Completed
        } else if self.succeeded() == 0 {
            RunStatus::Failed
        } else {
            RunStatus::PartialBackfillFailure
        };
        self.finished_at = Some(Utc::now());
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} ({}, {} mode): {}", self.run_id, self.dataset, self.mode, self.status)?;
        match &self.window {
            Some(window) => writeln!(f, "  window:   {}", window)?,
            None => writeln!(f, "  window:   unresolved")?,
        }
        writeln!(
            f,
            "  chunks:   {} attempted, {} succeeded, {} failed",
            self.attempted(),
            self.succeeded(),
            self.failed()
        )?;
        for (table, rows) in self.rows_written() {
            writeln!(f, "  {}: {} rows ({} changed)", table, rows, self.rows_changed(&table))?;
        }
        writeln!(f, "  rejected samples: {}", self.rejected())?;
        for chunk in self.chunks.iter().filter(|c| !c.succeeded()) {
            writeln!(f, "  FAILED {}: {}", chunk.chunk, chunk.error.as_deref().unwrap_or(""))?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "  error: {}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn report(index: usize, failed: bool) -> ChunkReport {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(index as i64);
        let mut report = ChunkReport::new(Chunk {
            index,
            start,
            end: start + Duration::days(1),
        });
        if failed {
            report.fail("Transient fetch failure: HTTP 503");
        } else {
            report.record_write("entsoe_load", 96, 96);
        }
        report
    }

    fn summary(outcomes: &[bool]) -> RunSummary {
        let mut summary = RunSummary::new(Dataset::EntsoeLoad, RunMode::Auto);
        for (i, failed) in outcomes.iter().enumerate() {
            summary.push(report(i + 1, *failed));
        }
        summary.finish();
        summary
    }

    #[test]
    fn test_status_and_exit_codes() {
        let all_ok = summary(&[false, false]);
        assert_eq!(all_ok.status, RunStatus::Completed);
        assert_eq!(all_ok.exit_code(), 0);

        let partial = summary(&[false, true, false]);
        assert_eq!(partial.status, RunStatus::PartialBackfillFailure);
        assert_eq!(partial.exit_code(), 0);

        let none_ok = summary(&[true, true]);
        assert_eq!(none_ok.status, RunStatus::Failed);
        assert_eq!(none_ok.exit_code(), 1);

        let nothing = summary(&[]);
        assert_eq!(nothing.status, RunStatus::Completed);

        let mut aborted = summary(&[false]);
        aborted.abort("Unknown dataset: ceps:foo");
        assert_eq!(aborted.exit_code(), 2);
    }

    #[test]
    fn test_summary_lists_failed_chunks() {
        let partial = summary(&[false, true, false]);
        assert_eq!(partial.rows_written().get("entsoe_load"), Some(&192));

        let text = partial.to_string();
        assert!(text.contains("3 attempted, 2 succeeded, 1 failed"));
        assert!(text.contains("FAILED chunk 2 [2025-01-03T00:00Z, 2025-01-04T00:00Z)"));
        assert!(text.contains("entsoe_load: 192 rows"));
    }

    #[test]
    fn test_json_summary() {
        let json = summary(&[false]).to_json().unwrap();
        assert!(json.contains("\"status\": \"Completed\""));
    }
}
