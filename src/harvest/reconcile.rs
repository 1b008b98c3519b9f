// src/harvest/reconcile.rs
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::time::{sleep, Instant};

use crate::utils::error::ReconcileError;

/// Extensions marking an in-progress transfer; such files never qualify.
const PARTIAL_EXTENSIONS: [&str; 3] = ["part", "crdownload", "tmp"];

/// Timing knobs for the staging watch.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Give up after this long without a qualifying download.
    pub timeout: Duration,
    /// Fixed interval between staging directory scans.
    pub poll_interval: Duration,
    /// Grace period after a candidate appears, so the writer has released
    /// the file before it is moved.
    pub settle_delay: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Watches the staging directory for the download belonging to the current
/// task: the newest stable file whose modification time is strictly after
/// `requested_at`. Returns the staged path for the store to commit, or
/// `Timeout` when the deadline passes first.
pub async fn await_download(
    staging_dir: &Path,
    requested_at: SystemTime,
    cfg: &ReconcileConfig,
) -> Result<PathBuf, ReconcileError> {
    let deadline = Instant::now() + cfg.timeout;
    loop {
        if let Some(candidate) = newest_since(staging_dir, requested_at)? {
            sleep(cfg.settle_delay).await;
            tracing::debug!("Staging candidate ready: {}", candidate.display());
            return Ok(candidate);
        }
        if Instant::now() >= deadline {
            return Err(ReconcileError::Timeout(cfg.timeout));
        }
        sleep(cfg.poll_interval).await;
    }
}

/// Newest qualifying file in the staging directory, or None. A candidate
/// must be a regular file, must not carry a partial-transfer extension, and
/// must have been modified strictly after `since` — leftovers from earlier
/// tasks or crashed runs never qualify.
fn newest_since(staging_dir: &Path, since: SystemTime) -> Result<Option<PathBuf>, ReconcileError> {
    // The session only creates the staging dir on its first download.
    if !staging_dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(staging_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if is_partial(&path) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if modified <= since {
            continue;
        }
        match &newest {
            Some((best, _)) if *best >= modified => {}
            _ => newest = Some((modified, path)),
        }
    }
    Ok(newest.map(|(_, path)| path))
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PARTIAL_EXTENSIONS.iter().any(|p| ext.eq_ignore_ascii_case(p)))
        .unwrap_or(false)
}
