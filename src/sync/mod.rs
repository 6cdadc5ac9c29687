//! Incremental archive synchronization.
//!
//! [`SyncEngine`] drives a run against three collaborators: a
//! [`ListingSource`] enumerating the archive page by page, a
//! [`RecordSource`] fetching SGF content, and a [`RecordSink`] storing it.
//! Which records were already saved lives in the player's ledger.
//!
//! [`RecordSink`]: crate::sink::RecordSink

mod engine;
mod error;
mod source;
mod types;

pub use engine::{create_progress_bar, SyncEngine};
pub use source::{ListingSource, PlayerLookup, RecordSource};
pub use types::SyncMode;
