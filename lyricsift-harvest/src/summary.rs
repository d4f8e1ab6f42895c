//! Job and worker reports

use crate::track::JobKind;
use chrono::{DateTime, Utc};
use lyricsift_common::config::Isolation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Why a track produced no row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No extractor matched the URL
    NoHandler,
    /// Page or API answered without usable content
    NoData,
    /// Permanent failure
    Fatal,
    /// Backoff ceiling reached
    RetriesExhausted,
    /// Job cancelled while the track was in flight
    Cancelled,
}

/// Counters for one worker's partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub index: usize,
    /// Tracks in the partition
    pub assigned: usize,
    /// Tracks that reached DONE or SKIPPED
    pub processed: usize,
    /// Rows written to the worker output
    pub written: usize,
    pub no_handler: usize,
    pub no_data: usize,
    pub fatal: usize,
    pub retries_exhausted: usize,
    /// Requests made, retries included
    pub attempts: u64,
    /// Worker stopped early on cancellation
    pub cancelled: bool,
}

impl WorkerReport {
    pub fn new(index: usize, assigned: usize) -> Self {
        Self {
            index,
            assigned,
            ..Default::default()
        }
    }

    pub fn record_written(&mut self) {
        self.processed += 1;
        self.written += 1;
    }

    /// Count a skipped track; a cancelled track is left unprocessed
    pub fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NoHandler => self.no_handler += 1,
            SkipReason::NoData => self.no_data += 1,
            SkipReason::Fatal => self.fatal += 1,
            SkipReason::RetriesExhausted => self.retries_exhausted += 1,
            SkipReason::Cancelled => {
                self.cancelled = true;
                return;
            }
        }
        self.processed += 1;
    }

    pub fn skipped(&self) -> usize {
        self.processed - self.written
    }
}

/// A partition whose worker terminated abnormally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub index: usize,
    pub reason: String,
    /// Rows the worker had flushed before it died, merged anyway
    pub rows_recovered: usize,
}

/// Outcome of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub isolation: Isolation,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output: PathBuf,
    /// Tracks accepted from the input
    pub tracks_total: usize,
    /// Input rows skipped as malformed or duplicate
    pub input_rejected: usize,
    /// Rows in the final output
    pub rows_written: usize,
    /// Worker rows refused at merge (unknown or repeated track id)
    pub rows_dropped: usize,
    /// Reports of workers that finished, in index order
    pub workers: Vec<WorkerReport>,
    pub failed: Vec<WorkerFailure>,
    pub cancelled: bool,
}

impl JobSummary {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Accepted tracks without an output row
    pub fn skipped(&self) -> usize {
        self.tracks_total.saturating_sub(self.rows_written)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
