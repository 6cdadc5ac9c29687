//! Persisting normalized game records.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

use crate::ledger::store::{sync_dir, write_synced};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Refusing to save under invalid name {0:?}")]
    InvalidName(String),
}

/// Destination for saved records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Store `content` under `name`, returning where it landed.
    async fn save(&self, content: &str, name: &str) -> Result<PathBuf, SinkError>;
}

/// Writes each record as a file in one directory.
///
/// Content goes to a `.part` file first, is flushed to disk, and is renamed
/// into place, so a reader never sees a half-written SGF and a saved record
/// is durable before its id can reach the ledger.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
}

#[async_trait]
impl RecordSink for DirectorySink {
    async fn save(&self, content: &str, name: &str) -> Result<PathBuf, SinkError> {
        if !is_plain_file_name(name) {
            return Err(SinkError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| SinkError::Io {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.directory.join(name);
        let part_path = self.directory.join(format!(".{}.part", name));

        if let Err(source) = write_synced(&part_path, content.trim().as_bytes()).await {
            let _ = fs::remove_file(&part_path).await;
            return Err(SinkError::Io {
                path: part_path,
                source,
            });
        }
        if let Err(source) = fs::rename(&part_path, &path).await {
            let _ = fs::remove_file(&part_path).await;
            return Err(SinkError::Io { path, source });
        }
        sync_dir(&self.directory).await;

        tracing::debug!("Saved {}", path.display());
        Ok(path)
    }
}
