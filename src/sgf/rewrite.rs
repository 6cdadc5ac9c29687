//! In-place repair of SGF files saved before normalization existed, or by
//! other tools.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::normalize::{needs_normalization, normalize};
use crate::ledger::store::write_synced;

#[derive(Debug, Default)]
pub struct RewriteReport {
    pub rewritten: Vec<PathBuf>,
    pub untouched: usize,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Run every `*.sgf` file directly inside `dir` through [`normalize`].
///
/// Files that need no change are not written. Changed files are replaced via
/// a sibling temp file and rename. A file that cannot be read or written is
/// recorded and the rest continue; only failing to list `dir` is an error.
pub async fn normalize_directory(dir: &Path) -> io::Result<RewriteReport> {
    let mut report = RewriteReport::default();
    let mut entries = fs::read_dir(dir).await?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || !name.ends_with(".sgf") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        match rewrite_file(&path).await {
            Ok(true) => {
                tracing::info!("Updated {}", path.display());
                report.rewritten.push(path);
            }
            Ok(false) => report.untouched += 1,
            Err(e) => {
                tracing::error!("Failed to rewrite {}: {}", path.display(), e);
                report.failed.push((path, e));
            }
        }
    }
    Ok(report)
}

async fn rewrite_file(path: &Path) -> io::Result<bool> {
    let raw = fs::read_to_string(path).await?;
    if !needs_normalization(&raw) {
        return Ok(false);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part_path = path.with_file_name(format!(".{}.part", name));
    if let Err(e) = write_synced(&part_path, normalize(&raw).as_bytes()).await {
        let _ = fs::remove_file(&part_path).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&part_path, path).await {
        let _ = fs::remove_file(&part_path).await;
        return Err(e);
    }
    Ok(true)
}
