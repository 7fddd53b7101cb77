use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const STAGING_SUFFIX: &str = ".part";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fresh sibling file a single write is staged in before being renamed into
/// place. Same directory as the destination so the final rename never
/// crosses filesystems; unique per call so overlapping writes of one report
/// never share a staging file.
pub(crate) fn staging_path(destination: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{}{}", std::process::id(), seq, STAGING_SUFFIX));
    destination.with_file_name(name)
}

/// Replace `destination` with `bytes`, all or nothing.
///
/// Readers of `destination` see either the previous report or one complete
/// new one, never a truncated or interleaved file. Concurrent writers each
/// stage separately; the last rename wins. A failed write removes its own
/// staging file and nothing else.
pub async fn write_report(destination: &Path, bytes: &[u8]) -> io::Result<()> {
    let staging = staging_path(destination);
    let result = stage_and_rename(destination, &staging, bytes).await;
    if result.is_err() {
        let _ = fs::remove_file(&staging).await;
    }
    result
}

async fn stage_and_rename(destination: &Path, staging: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        options.mode(0o644);
    }

    let mut file = options.open(staging).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(staging, destination).await
}

/// Remove a report after a failed refresh so an out-of-date copy is not
/// served as current. A missing file is fine.
pub async fn discard_report(destination: &Path) {
    match fs::remove_file(destination).await {
        Ok(()) => tracing::debug!("Removed stale {}", destination.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove stale {}: {}", destination.display(), e),
    }
}

/// Staging files left behind in `directory`.
#[cfg(test)]
pub(crate) fn leftover_staging(directory: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(directory) {
        Ok(entries) => entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(STAGING_SUFFIX))
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}
