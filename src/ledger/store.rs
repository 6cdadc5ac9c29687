//! File-backed ledger storage, one JSON file per player.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use fs4::fs_std::FileExt;
use rand::Rng as _;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::LedgerError;
use super::types::{Ledger, LedgerFile, LedgerFileRef, LedgerSummary};
use crate::types::PlayerId;

/// Keep only word characters so a player id is always a safe file stem.
pub fn sanitize_player(player: &PlayerId) -> String {
    player
        .as_str()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Directory holding `<player>.ledger.json` and `<player>.lock` files.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    dir: PathBuf,
}

/// Exclusive per-player lock, released when dropped.
#[derive(Debug)]
pub struct LedgerLock {
    #[allow(dead_code)] // held for its advisory lock
    file: std::fs::File,
    path: PathBuf,
}

impl LedgerLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, player: &PlayerId) -> PathBuf {
        self.dir
            .join(format!("{}.ledger.json", sanitize_player(player)))
    }

    /// Load the ledger for `player`. A missing file is an empty ledger.
    pub async fn load(&self, player: &PlayerId) -> Result<Ledger, LedgerError> {
        let path = self.path_for(player);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(player = %player, "No ledger at {}, starting empty", path.display());
                return Ok(Ledger::empty(player.clone()));
            }
            Err(e) => return Err(LedgerError::io(path, e)),
        };

        let file: LedgerFile = serde_json::from_slice(&contents)
            .map_err(|source| LedgerError::Corrupt {
                path: path.clone(),
                source,
            })?;

        if file.player != *player {
            return Err(LedgerError::ScopeMismatch {
                path,
                expected: player.clone(),
                found: file.player,
            });
        }

        tracing::debug!(
            player = %player,
            known = file.ids.len(),
            "Loaded ledger from {}",
            path.display()
        );
        Ok(Ledger::from_parts(file.player, file.ids))
    }

    /// Write the full ledger atomically: temp file in the same directory,
    /// fsync, then rename over the previous version. On failure the old
    /// file is left untouched.
    pub async fn persist(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let path = self.path_for(ledger.player());
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| LedgerError::io(&self.dir, e))?;

        let json = serde_json::to_vec_pretty(&LedgerFileRef::from(ledger))?;
        let tmp_path = temp_path(&path);

        if let Err(e) = write_synced(&tmp_path, &json).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LedgerError::io(tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LedgerError::io(path, e));
        }
        sync_dir(&self.dir).await;

        tracing::debug!(
            player = %ledger.player(),
            known = ledger.len(),
            "Persisted ledger to {}",
            path.display()
        );
        Ok(())
    }

    /// Take the per-player run lock. Fails fast if another process holds it.
    pub async fn lock(&self, player: &PlayerId) -> Result<LedgerLock, LedgerError> {
        let dir = self.dir.clone();
        let path = self.dir.join(format!("{}.lock", sanitize_player(player)));
        let player = player.clone();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| LedgerError::io(&dir, e))?;
            let file = std::fs::File::create(&path).map_err(|e| LedgerError::io(&path, e))?;
            match FileExt::try_lock_exclusive(&file) {
                Ok(true) => Ok(LedgerLock { file, path }),
                Ok(false) => Err(LedgerError::Locked { player, path }),
                Err(e) => Err(LedgerError::io(path, e)),
            }
        })
        .await?
    }

    /// Delete the ledger file. Returns `false` if there was none.
    pub async fn remove(&self, player: &PlayerId) -> Result<bool, LedgerError> {
        let path = self.path_for(player);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LedgerError::io(path, e)),
        }
    }

    /// Summary for `status`, or `None` if no ledger exists yet.
    pub async fn summary(&self, player: &PlayerId) -> Result<Option<LedgerSummary>, LedgerError> {
        let path = self.path_for(player);
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LedgerError::io(path, e)),
        };
        let ledger = self.load(player).await?;

        Ok(Some(LedgerSummary {
            path,
            player: ledger.player().clone(),
            record_count: ledger.len(),
            last_modified: metadata.modified().ok().map(DateTime::<Local>::from),
        }))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nonce: u32 = rand::thread_rng().gen();
    path.with_file_name(format!(".{}.{}.{:08x}.tmp", name, std::process::id(), nonce))
}

pub(crate) async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Make the rename durable. Best effort: not every platform can fsync a
/// directory handle.
pub(crate) async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        let dir = dir.to_path_buf();
        let result = tokio::task::spawn_blocking(move || std::fs::File::open(&dir)?.sync_all()).await;
        if let Ok(Err(e)) = result {
            tracing::debug!("Directory fsync failed: {}", e);
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("foxwq_sgf_rs")
            .join("ledger_store_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn player(id: &str) -> PlayerId {
        PlayerId::from(id)
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let store = LedgerStore::new(test_dir("load_missing"));
        let ledger = store.load(&player("100")).await.unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.player().as_str(), "100");
    }

    #[tokio::test]
    async fn test_load_missing_directory_is_empty() {
        let store = LedgerStore::new(test_dir("load_missing_dir").join("not").join("there"));
        assert!(store.load(&player("100")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_then_reload() {
        let store = LedgerStore::new(test_dir("persist_reload"));
        let mut ledger = store.load(&player("100")).await.unwrap();
        ledger.add(RecordId::from("a"));
        ledger.add(RecordId::from("b"));
        store.persist(&ledger).await.unwrap();

        let reloaded = store.load(&player("100")).await.unwrap();
        assert_eq!(reloaded, ledger);
    }

    #[tokio::test]
    async fn test_persist_leaves_no_temp_files() {
        let dir = test_dir("no_temp_files");
        let store = LedgerStore::new(&dir);
        let mut ledger = Ledger::empty(player("100"));
        ledger.add(RecordId::from("a"));
        store.persist(&ledger).await.unwrap();
        store.persist(&ledger).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["100.ledger.json".to_string()]);
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_contents() {
        let store = LedgerStore::new(test_dir("replace"));
        let mut ledger = Ledger::empty(player("100"));
        ledger.add(RecordId::from("a"));
        store.persist(&ledger).await.unwrap();
        ledger.add(RecordId::from("b"));
        store.persist(&ledger).await.unwrap();

        let reloaded = store.load(&player("100")).await.unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn test_scopes_are_separate_files() {
        let store = LedgerStore::new(test_dir("scopes"));
        let mut first = Ledger::empty(player("1"));
        first.add(RecordId::from("shared-id"));
        store.persist(&first).await.unwrap();

        let second = store.load(&player("2")).await.unwrap();
        assert!(!second.contains(&RecordId::from("shared-id")));
        assert_ne!(store.path_for(&player("1")), store.path_for(&player("2")));
    }

    #[tokio::test]
    async fn test_scope_mismatch_rejected() {
        let dir = test_dir("scope_mismatch");
        let store = LedgerStore::new(&dir);
        // "1.2" and "12" sanitize to the same file stem
        let mut other = Ledger::empty(player("1.2"));
        other.add(RecordId::from("x"));
        store.persist(&other).await.unwrap();

        let err = store.load(&player("12")).await.unwrap_err();
        assert!(matches!(err, LedgerError::ScopeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error_not_empty() {
        let dir = test_dir("corrupt");
        let store = LedgerStore::new(&dir);
        std::fs::write(store.path_for(&player("100")), b"{ not json").unwrap();

        let err = store.load(&player("100")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_persist_into_unwritable_location_fails() {
        let dir = test_dir("unwritable");
        let blocker = dir.join("file-not-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let store = LedgerStore::new(&blocker);

        let err = store.persist(&Ledger::empty(player("1"))).await.unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = LedgerStore::new(test_dir("remove"));
        assert!(!store.remove(&player("1")).await.unwrap());
        store.persist(&Ledger::empty(player("1"))).await.unwrap();
        assert!(store.remove(&player("1")).await.unwrap());
        assert!(store.load(&player("1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary() {
        let store = LedgerStore::new(test_dir("summary"));
        assert!(store.summary(&player("1")).await.unwrap().is_none());

        let mut ledger = Ledger::empty(player("1"));
        ledger.add(RecordId::from("a"));
        ledger.add(RecordId::from("b"));
        store.persist(&ledger).await.unwrap();

        let summary = store.summary(&player("1")).await.unwrap().unwrap();
        assert_eq!(summary.record_count, 2);
        assert_eq!(summary.path, store.path_for(&player("1")));
        assert!(summary.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_second_lock_for_same_player_fails() {
        let store = LedgerStore::new(test_dir("lock"));
        let held = store.lock(&player("1")).await.unwrap();
        assert!(held.path().exists());

        let err = store.lock(&player("1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Locked { .. }));

        // other players are independent
        let _other = store.lock(&player("2")).await.unwrap();

        drop(held);
        store.lock(&player("1")).await.unwrap();
    }

    #[test]
    fn test_sanitize_player() {
        assert_eq!(sanitize_player(&player("123456")), "123456");
        assert_eq!(sanitize_player(&player("../evil")), "evil");
    }
}
