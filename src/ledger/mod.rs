//! Download ledger: the durable set of record ids already saved, one per
//! target player.
//!
//! The ledger lets re-runs skip everything fetched before. It is loaded at
//! the start of a sync, grows as records are saved, and is rewritten
//! atomically at the end, so an interrupted run leaves either the previous
//! ledger or the new one on disk, never a partial file.

pub mod error;
pub mod store;
pub mod types;

pub use error::LedgerError;
pub use store::LedgerStore;
pub use types::Ledger;
