use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::fox::FoxError;
use crate::sink::SinkError;
use crate::types::RecordId;

/// How much of the archive a run enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every record reachable by paging until an empty page.
    All,
    /// The `n` most recent records from a single listing call.
    Recent(u32),
}

/// Why a single candidate could not be saved. Never aborts the run.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] FoxError),
    #[error("save failed: {0}")]
    Save(#[source] SinkError),
    #[error("unusable listing entry {position}: {reason}")]
    MalformedEntry { position: usize, reason: String },
}

/// Result of processing one listing entry.
#[derive(Debug)]
pub enum CandidateOutcome {
    Saved { path: PathBuf },
    /// Already in the ledger before this candidate was reached.
    Known,
    /// The same id appeared earlier in this run.
    Duplicate,
    Failed(CandidateError),
}

#[derive(Debug)]
pub struct RecordFailure {
    /// `None` when the listing entry itself had no usable id.
    pub id: Option<RecordId>,
    pub error: CandidateError,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} ({})", id, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Counts for one run, producible even when some records failed.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Listing entries seen, duplicates included.
    pub candidates: u64,
    /// Known plus duplicate entries; no fetch was issued for these.
    pub skipped: u64,
    pub duplicates: u64,
    pub saved: u64,
    pub failed: u64,
    pub listing_calls: u64,
    pub saved_files: Vec<PathBuf>,
    pub failures: Vec<RecordFailure>,
}

impl SyncReport {
    pub(crate) fn record(&mut self, id: Option<&RecordId>, outcome: CandidateOutcome) {
        self.candidates += 1;
        match outcome {
            CandidateOutcome::Saved { path } => {
                self.saved += 1;
                self.saved_files.push(path);
            }
            CandidateOutcome::Known => self.skipped += 1,
            CandidateOutcome::Duplicate => {
                self.skipped += 1;
                self.duplicates += 1;
            }
            CandidateOutcome::Failed(error) => {
                self.failed += 1;
                self.failures.push(RecordFailure {
                    id: id.cloned(),
                    error,
                });
            }
        }
    }

    /// Nothing new was found and nothing failed.
    pub fn is_up_to_date(&self) -> bool {
        self.saved == 0 && self.failed == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidates, {} skipped, {} saved, {} failed",
            self.candidates, self.skipped, self.saved, self.failed
        )
    }
}
