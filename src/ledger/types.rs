//! In-memory ledger and its on-disk representation.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::types::{PlayerId, RecordId};

pub(crate) const LEDGER_FORMAT_VERSION: u32 = 1;

/// Record ids already saved for one player.
///
/// The set only grows: nothing in the sync path removes an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    player: PlayerId,
    known: BTreeSet<RecordId>,
}

impl Ledger {
    pub fn empty(player: PlayerId) -> Self {
        Self {
            player,
            known: BTreeSet::new(),
        }
    }

    pub(crate) fn from_parts(player: PlayerId, known: BTreeSet<RecordId>) -> Self {
        Self { player, known }
    }

    pub fn player(&self) -> &PlayerId {
        &self.player
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.known.contains(id)
    }

    /// Returns `true` if the id was not already known.
    pub fn add(&mut self, id: RecordId) -> bool {
        self.known.insert(id)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.known.iter()
    }
}

/// Serialized form written by `LedgerStore::persist`.
#[derive(Serialize)]
pub(crate) struct LedgerFileRef<'a> {
    pub version: u32,
    pub player: &'a PlayerId,
    pub ids: &'a BTreeSet<RecordId>,
}

impl<'a> From<&'a Ledger> for LedgerFileRef<'a> {
    fn from(ledger: &'a Ledger) -> Self {
        Self {
            version: LEDGER_FORMAT_VERSION,
            player: &ledger.player,
            ids: &ledger.known,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct LedgerFile {
    #[serde(default)]
    #[allow(dead_code)] // only one format so far
    pub version: u32,
    pub player: PlayerId,
    pub ids: BTreeSet<RecordId>,
}

/// What `status` reports about a player's ledger.
#[derive(Debug, Clone)]
pub struct LedgerSummary {
    pub path: PathBuf,
    pub player: PlayerId,
    pub record_count: usize,
    pub last_modified: Option<DateTime<Local>>,
}
