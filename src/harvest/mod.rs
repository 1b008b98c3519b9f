// src/harvest/mod.rs
pub mod reconcile;

use std::path::PathBuf;
use std::time::SystemTime;

use crate::storage::ArtifactStore;
use crate::tradestat::{Period, ReportQuery, ReportSession, SubmitOutcome};
use crate::utils::error::AppError;
use reconcile::ReconcileConfig;

/// Run-wide settings threaded into the driver. Import and export trees run
/// the same code under different configs.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// First year of the period grid.
    pub start_year: i32,
    /// Last closed month to request; the grid never reaches past it.
    pub through: Period,
    /// Shared staging area downloads land in before relocation.
    pub staging_dir: PathBuf,
    /// Staging watch timing.
    pub reconcile: ReconcileConfig,
}

/// Counters reported at the end of a crawl.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub codes: usize,
    /// Codes the completion oracle skipped outright.
    pub codes_complete: usize,
    /// Periods downloaded and committed this run.
    pub saved: usize,
    /// Periods whose artifact already existed.
    pub skipped: usize,
    /// Periods the portal legitimately has no rows for.
    pub no_data: usize,
    /// Periods that errored; retried on the next run via the on-disk ledger.
    pub failed: usize,
}

enum PeriodOutcome {
    Saved,
    NoData,
}

/// Crawls codes x periods, skipping everything already on disk. Re-running
/// after any interruption reproduces the same artifact set and performs no
/// redundant portal work.
pub async fn run(
    session: &dyn ReportSession,
    store: &ArtifactStore,
    cfg: &HarvestConfig,
    codes: &[String],
) -> Result<HarvestSummary, AppError> {
    let mut summary = HarvestSummary {
        codes: codes.len(),
        ..Default::default()
    };
    let grid = Period::expected_range(cfg.start_year, cfg.through);
    tracing::info!(
        "Processing {} HS codes across {} periods each",
        codes.len(),
        grid.len()
    );

    for (idx, code) in codes.iter().enumerate() {
        tracing::info!("Processing HS code {}/{}: {}", idx + 1, codes.len(), code);

        // Fast skip-gate before the per-period loop.
        if store.is_code_complete(code, cfg.start_year, cfg.through) {
            tracing::info!("Skipping {} - all files already downloaded", code);
            summary.codes_complete += 1;
            continue;
        }

        for period in &grid {
            if store.exists(code, *period) {
                summary.skipped += 1;
                continue;
            }
            match fetch_period(session, store, cfg, code, *period).await {
                Ok(PeriodOutcome::Saved) => summary.saved += 1,
                Ok(PeriodOutcome::NoData) => {
                    tracing::info!("No data for {} {}; skipping", code, period);
                    summary.no_data += 1;
                }
                // One bad period must never abort the remaining periods or
                // the remaining codes.
                Err(e) => {
                    tracing::warn!("Error processing {} {}: {}", code, period, e);
                    summary.failed += 1;
                }
            }
        }
    }

    // Best-effort cleanup; stray files keep the directory and that is fine.
    if let Err(e) = std::fs::remove_dir(&cfg.staging_dir) {
        tracing::debug!("Staging directory left in place: {}", e);
    }

    tracing::info!(
        "Harvest finished for {} codes. saved: {}, skipped: {}, no-data: {}, failed: {}, complete codes: {}",
        summary.codes,
        summary.saved,
        summary.skipped,
        summary.no_data,
        summary.failed,
        summary.codes_complete
    );
    Ok(summary)
}

async fn fetch_period(
    session: &dyn ReportSession,
    store: &ArtifactStore,
    cfg: &HarvestConfig,
    code: &str,
    period: Period,
) -> Result<PeriodOutcome, AppError> {
    tracing::info!("Downloading {} for {}", code, period);
    let requested_at = SystemTime::now();

    match session.submit(&ReportQuery::new(code, period)).await? {
        SubmitOutcome::NoData => Ok(PeriodOutcome::NoData),
        SubmitOutcome::Exported => {
            let staged =
                reconcile::await_download(&cfg.staging_dir, requested_at, &cfg.reconcile).await?;
            store.commit(code, period, &staged)?;
            Ok(PeriodOutcome::Saved)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tradestat::Flow;
    use crate::utils::error::SessionError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Clone, Copy)]
    enum Canned {
        Export,
        /// Claims Exported but never lands a file, forcing a staging timeout.
        ExportWithoutFile,
        NoData,
        Fail,
    }

    struct FakeSession {
        staging_dir: PathBuf,
        canned: HashMap<(String, Period), Canned>,
        submissions: AtomicUsize,
    }

    impl FakeSession {
        fn new(staging_dir: &Path) -> Self {
            Self {
                staging_dir: staging_dir.to_path_buf(),
                canned: HashMap::new(),
                submissions: AtomicUsize::new(0),
            }
        }

        fn with(mut self, code: &str, period: Period, outcome: Canned) -> Self {
            self.canned.insert((code.to_string(), period), outcome);
            self
        }

        fn submissions(&self) -> usize {
            self.submissions.load(Ordering::SeqCst)
        }

        fn land_download(&self) {
            fs::create_dir_all(&self.staging_dir).unwrap();
            let path = self.staging_dir.join("meidb_report.xlsx");
            fs::write(&path, b"workbook").unwrap();
            // Nudge mtime past the request timestamp regardless of the
            // filesystem's timestamp granularity.
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::now() + Duration::from_secs(1))
                .unwrap();
        }
    }

    #[async_trait]
    impl ReportSession for FakeSession {
        async fn submit(&self, query: &ReportQuery) -> Result<SubmitOutcome, SessionError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            let canned = self
                .canned
                .get(&(query.hs_code.clone(), query.period))
                .copied()
                .unwrap_or(Canned::Export);
            match canned {
                Canned::Export => {
                    self.land_download();
                    Ok(SubmitOutcome::Exported)
                }
                Canned::ExportWithoutFile => Ok(SubmitOutcome::Exported),
                Canned::NoData => Ok(SubmitOutcome::NoData),
                Canned::Fail => Err(SessionError::FormNotFound),
            }
        }
    }

    fn quick_cfg(staging_dir: &Path) -> HarvestConfig {
        HarvestConfig {
            start_year: 2025,
            through: Period::new(2025, 3),
            staging_dir: staging_dir.to_path_buf(),
            reconcile: ReconcileConfig {
                timeout: Duration::from_millis(300),
                poll_interval: Duration::from_millis(25),
                settle_delay: Duration::from_millis(5),
            },
        }
    }

    fn artifact_set(store: &ArtifactStore, code: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(store.code_dir(code))
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn second_run_touches_the_portal_zero_times() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Flow::Import).unwrap();
        let cfg = quick_cfg(&dir.path().join("staging"));
        let codes = vec!["26030000".to_string()];

        let session = FakeSession::new(&cfg.staging_dir);
        let first = run(&session, &store, &cfg, &codes).await.unwrap();
        assert_eq!(first.saved, 3);
        assert_eq!(session.submissions(), 3);
        let after_first = artifact_set(&store, "26030000");

        let session = FakeSession::new(&cfg.staging_dir);
        let second = run(&session, &store, &cfg, &codes).await.unwrap();
        assert_eq!(session.submissions(), 0, "rerun must perform no portal work");
        assert_eq!(second.saved, 0);
        assert_eq!(second.codes_complete, 1);
        assert_eq!(artifact_set(&store, "26030000"), after_first);
    }

    #[tokio::test]
    async fn no_data_is_counted_apart_from_failure() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Flow::Import).unwrap();
        let cfg = quick_cfg(&dir.path().join("staging"));
        let codes = vec!["26030000".to_string()];

        let session = FakeSession::new(&cfg.staging_dir)
            .with("26030000", Period::new(2025, 2), Canned::NoData);
        let summary = run(&session, &store, &cfg, &codes).await.unwrap();

        assert_eq!(summary.no_data, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.saved, 2);
        assert!(
            !store.exists("26030000", Period::new(2025, 2)),
            "a no-data period must write nothing"
        );
    }

    #[tokio::test]
    async fn staging_timeout_is_a_failure_not_no_data() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Flow::Import).unwrap();
        let cfg = quick_cfg(&dir.path().join("staging"));
        let codes = vec!["26030000".to_string()];

        let session = FakeSession::new(&cfg.staging_dir)
            .with("26030000", Period::new(2025, 1), Canned::ExportWithoutFile);
        let summary = run(&session, &store, &cfg, &codes).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.no_data, 0);
        assert_eq!(summary.saved, 2);
    }

    #[tokio::test]
    async fn one_bad_period_never_aborts_the_rest() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Flow::Import).unwrap();
        let cfg = quick_cfg(&dir.path().join("staging"));
        let codes = vec!["26030000".to_string(), "72029990".to_string()];

        let session = FakeSession::new(&cfg.staging_dir)
            .with("26030000", Period::new(2025, 2), Canned::Fail);
        let summary = run(&session, &store, &cfg, &codes).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.saved, 5, "remaining periods and codes still processed");
        assert!(store.exists("72029990", Period::new(2025, 3)));
    }

    #[tokio::test]
    async fn partially_complete_code_only_fills_the_gaps() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Flow::Import).unwrap();
        let cfg = quick_cfg(&dir.path().join("staging"));
        let codes = vec!["26030000".to_string()];

        // Two of three periods already acquired by an earlier, killed run.
        for period in [Period::new(2025, 1), Period::new(2025, 3)] {
            let p = store.artifact_path("26030000", period);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(&p, b"existing").unwrap();
        }

        let session = FakeSession::new(&cfg.staging_dir);
        let summary = run(&session, &store, &cfg, &codes).await.unwrap();

        assert_eq!(session.submissions(), 1, "only the gap is fetched");
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(
            fs::read(store.artifact_path("26030000", Period::new(2025, 1))).unwrap(),
            b"existing",
            "existing artifacts are never rewritten"
        );
    }
}
