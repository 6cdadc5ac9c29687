//! One synchronization run: enumerate candidates, fetch what the ledger does
//! not know, normalize, name, save, and record.
//!
//! Candidates are processed strictly one after another in listing order. A
//! record id enters the ledger only after its sink write succeeded, and the
//! ledger is persisted once at the end of the run, including runs that end in
//! a listing error.

use std::collections::HashSet;
use std::io::IsTerminal;
use std::time::Duration;

use futures_util::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use super::error::SyncError;
use super::source::{listing_pages, ListingSource, RecordSource};
use super::types::{CandidateError, CandidateOutcome, SyncMode, SyncReport};
use crate::fox::ListingEntry;
use crate::ledger::{Ledger, LedgerStore};
use crate::sgf;
use crate::sink::RecordSink;
use crate::types::{PlayerId, RecordId};

/// Spinner shown while a run walks the archive.
///
/// Hidden when the user passed `--no-progress-bar` or stdout is not a TTY.
/// The archive size is unknown up front, so this counts rather than fills.
pub fn create_progress_bar(no_progress_bar: bool) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {spinner} {pos} records {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub struct SyncEngine<'a> {
    listing: &'a dyn ListingSource,
    records: &'a dyn RecordSource,
    sink: &'a dyn RecordSink,
    ledgers: &'a LedgerStore,
    page_size: Option<u32>,
    progress: ProgressBar,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        listing: &'a dyn ListingSource,
        records: &'a dyn RecordSource,
        sink: &'a dyn RecordSink,
        ledgers: &'a LedgerStore,
    ) -> Self {
        Self {
            listing,
            records,
            sink,
            ledgers,
            page_size: None,
            progress: ProgressBar::hidden(),
        }
    }

    /// Page size requested in full-archive mode. `None` leaves it to the
    /// server.
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run a full synchronization for `player`: load its ledger, process
    /// every candidate, persist the ledger, report.
    ///
    /// Per-record failures are in the report. A listing failure is returned
    /// as an error, but only after the records saved before it have been
    /// persisted to the ledger.
    pub async fn synchronize(
        &self,
        player: &PlayerId,
        mode: SyncMode,
    ) -> Result<SyncReport, SyncError> {
        let mut ledger = self
            .ledgers
            .load(player)
            .await
            .map_err(SyncError::LedgerLoad)?;
        let known_before = ledger.len();

        let mut report = SyncReport::default();
        let walked = self.run(&mut ledger, mode, &mut report).await;
        let persisted = self.ledgers.persist(&ledger).await;
        self.progress.finish_and_clear();

        match (walked, persisted) {
            (Ok(()), Ok(())) => {
                tracing::debug!(
                    player = %player,
                    added = ledger.len() - known_before,
                    "Run complete"
                );
                Ok(report)
            }
            (Ok(()), Err(e)) => Err(SyncError::LedgerPersist(e)),
            (Err(walk_err), Ok(())) => {
                tracing::info!(
                    "Run aborted after {} saved; ledger persisted",
                    report.saved
                );
                Err(walk_err)
            }
            (Err(walk_err), Err(persist_err)) => {
                tracing::error!("Failed to persist ledger after aborted run: {}", persist_err);
                Err(walk_err)
            }
        }
    }

    /// Process every candidate of one run against `ledger`, adding the ids
    /// that were saved. Counts accumulate in `report` even when an error
    /// ends the walk early.
    pub async fn run(
        &self,
        ledger: &mut Ledger,
        mode: SyncMode,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let player = ledger.player().clone();
        let mut seen = HashSet::new();

        match mode {
            SyncMode::All => {
                let pages = listing_pages(self.listing, &player, self.page_size);
                tokio::pin!(pages);
                loop {
                    report.listing_calls += 1;
                    let Some(page) = pages.try_next().await? else {
                        break;
                    };
                    tracing::debug!(
                        page = report.listing_calls,
                        entries = page.len(),
                        "Fetched listing page"
                    );
                    self.process_page(&player, page, ledger, &mut seen, report)
                        .await;
                }
            }
            SyncMode::Recent(n) => {
                report.listing_calls += 1;
                let page = self
                    .listing
                    .list_page(&player, None, Some(n))
                    .await
                    .map_err(SyncError::Listing)?;
                self.process_page(&player, page, ledger, &mut seen, report)
                    .await;
            }
        }
        Ok(())
    }

    async fn process_page(
        &self,
        player: &PlayerId,
        page: Vec<ListingEntry>,
        ledger: &mut Ledger,
        seen: &mut HashSet<RecordId>,
        report: &mut SyncReport,
    ) {
        for entry in page {
            match entry {
                ListingEntry::Game(meta) => {
                    let outcome = self
                        .process_candidate(player, &meta.id, ledger, seen)
                        .await;
                    if let CandidateOutcome::Failed(e) = &outcome {
                        self.progress.suspend(|| {
                            tracing::error!(chess_id = %meta.id, "Record failed: {}", e);
                            tracing::debug!(
                                chess_id = %meta.id,
                                listing = ?meta.extra,
                                "Listing entry of failed record"
                            );
                        });
                    }
                    report.record(Some(&meta.id), outcome);
                }
                ListingEntry::Malformed { position, reason } => {
                    let error = CandidateError::MalformedEntry { position, reason };
                    self.progress
                        .suspend(|| tracing::error!("Skipping listing entry: {}", error));
                    report.record(None, CandidateOutcome::Failed(error));
                }
            }
            self.progress.inc(1);
        }
    }

    async fn process_candidate(
        &self,
        player: &PlayerId,
        id: &RecordId,
        ledger: &mut Ledger,
        seen: &mut HashSet<RecordId>,
    ) -> CandidateOutcome {
        if !seen.insert(id.clone()) {
            tracing::debug!(chess_id = %id, "Duplicate listing entry");
            return CandidateOutcome::Duplicate;
        }
        if ledger.contains(id) {
            return CandidateOutcome::Known;
        }

        let raw = match self.records.fetch_record(id, player).await {
            Ok(raw) => raw,
            Err(e) => return CandidateOutcome::Failed(CandidateError::Fetch(e)),
        };
        let content = sgf::normalize(&raw);
        let name = sgf::derive_filename(&content, id);
        self.progress.set_message(name.clone());

        match self.sink.save(&content, &name).await {
            Ok(path) => {
                ledger.add(id.clone());
                self.progress
                    .suspend(|| tracing::info!(chess_id = %id, "Saved {}", name));
                CandidateOutcome::Saved { path }
            }
            Err(e) => CandidateOutcome::Failed(CandidateError::Save(e)),
        }
    }
}
