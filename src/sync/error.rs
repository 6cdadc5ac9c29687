use thiserror::Error;

use crate::fox::FoxError;
use crate::ledger::LedgerError;
use crate::types::RecordId;

/// Run-level failures. Per-record problems never surface here; they are
/// counted in the `SyncReport`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Listing request failed: {0}")]
    Listing(#[source] FoxError),

    /// A non-empty page ended on the cursor it was requested with, so the
    /// next request would return the same page again.
    #[error("Pagination stalled: page after chess id {cursor} ended on the same id")]
    PaginationStalled { cursor: RecordId },

    /// A non-empty page had no entry with a usable chess id to continue
    /// from.
    #[error("Pagination stalled: none of the {entries} entries on the page has a chess id")]
    NoCursor { entries: usize },

    #[error("Failed to load ledger: {0}")]
    LedgerLoad(#[source] LedgerError),

    #[error("Failed to persist ledger: {0}")]
    LedgerPersist(#[source] LedgerError),
}
