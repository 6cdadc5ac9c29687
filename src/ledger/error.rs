//! Error types for the download ledger.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::PlayerId;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but is not a readable ledger. Never treated as empty:
    /// silently starting over would re-download the whole archive.
    #[error("Ledger file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Ledger file {path} belongs to player {found}, expected {expected}")]
    ScopeMismatch {
        path: PathBuf,
        expected: PlayerId,
        found: PlayerId,
    },

    #[error("Another sync is already running for player {player} (lock: {path})")]
    Locked { player: PlayerId, path: PathBuf },

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
