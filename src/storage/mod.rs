// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::tradestat::models::{Flow, Period};
use crate::utils::error::StorageError;

/// Staging area for in-flight downloads, kept beside the code directories
/// under the flow root. The transformer knows the name so it never mistakes
/// the staging area for a code directory.
pub const STAGING_DIR_NAME: &str = "staging";

/// Filesystem-as-ledger store for raw monthly artifacts. Presence of a file
/// at its canonical path is the sole completion record; there is no
/// separate manifest to corrupt, which is what makes the crawl safely
/// resumable after an external kill.
pub struct ArtifactStore {
    root: PathBuf, // <base>/<import|export>
}

impl ArtifactStore {
    /// Creates a store rooted at `<base_dir>/<flow>`.
    pub fn new<P: AsRef<Path>>(base_dir: P, flow: Flow) -> Result<Self, StorageError> {
        let root = base_dir.as_ref().join(flow.dir_name());

        // Create the root directory if it doesn't exist
        if !root.exists() {
            fs::create_dir_all(&root).map_err(StorageError::IoError)?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Transient holding area for downloads before relocation.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR_NAME)
    }

    /// Directory holding one code's monthly artifacts.
    pub fn code_dir(&self, hs_code: &str) -> PathBuf {
        self.root.join(hs_code)
    }

    /// Canonical slot for one (code, period) artifact. The exact
    /// `<FullMonthName>_<Year>.xlsx` naming is load-bearing: every run
    /// re-derives it to decide what is already done.
    pub fn artifact_path(&self, hs_code: &str, period: Period) -> PathBuf {
        self.code_dir(hs_code)
            .join(format!("{}_{}.xlsx", period.month_name(), period.year))
    }

    /// Whether the artifact for one (code, period) is already on disk.
    pub fn exists(&self, hs_code: &str, period: Period) -> bool {
        self.artifact_path(hs_code, period).exists()
    }

    /// Completion oracle: true iff every period in `[start_year ..= through]`
    /// has its artifact on disk. Returns false immediately when the code has
    /// no directory at all, without walking the period grid.
    pub fn is_code_complete(&self, hs_code: &str, start_year: i32, through: Period) -> bool {
        if !self.code_dir(hs_code).exists() {
            return false;
        }
        Period::expected_range(start_year, through)
            .iter()
            .all(|period| self.exists(hs_code, *period))
    }

    /// Accepts exactly one write for a slot: moves the staged download into
    /// place. The driver only commits slots that `exists` reported absent,
    /// so nothing is ever overwritten.
    pub fn commit(
        &self,
        hs_code: &str,
        period: Period,
        staged: &Path,
    ) -> Result<PathBuf, StorageError> {
        let target = self.artifact_path(hs_code, period);

        if let Some(parent) = target.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(StorageError::IoError)?;
            }
        }

        // rename moves within one filesystem; staging on another device
        // falls back to copy + remove, preserving move-not-copy semantics.
        if fs::rename(staged, &target).is_err() {
            fs::copy(staged, &target).map_err(StorageError::IoError)?;
            fs::remove_file(staged).map_err(StorageError::IoError)?;
        }

        tracing::info!("Saved artifact to {}", target.display());
        Ok(target)
    }
}
