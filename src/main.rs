// src/main.rs
mod catalog;
mod harvest;
mod storage;
mod tradestat;
mod transform;
mod utils;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use harvest::reconcile::ReconcileConfig;
use harvest::HarvestConfig;
use storage::ArtifactStore;
use tradestat::{Flow, HttpReportSession, Period};
use utils::AppError;

/// Command Line Interface for the commodity trade statistics pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download monthly wide-format artifacts from the trade portal
    Harvest {
        /// Which side of the trade ledger to acquire
        #[arg(long, value_enum)]
        flow: Flow,

        /// Text file with one HS code per line (# comments allowed)
        #[arg(long)]
        codes_file: PathBuf,

        /// Root of the raw artifact tree
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// First year of the period grid
        #[arg(long, default_value = "2018")]
        start_year: i32,

        /// Base URL of the trade statistics portal
        #[arg(long, default_value = "https://tradestat.commerce.gov.in/")]
        base_url: String,

        /// Seconds to wait for a download to land in staging
        #[arg(long, default_value = "60")]
        download_timeout: u64,
    },

    /// Reshape downloaded artifacts into long-format per-code CSVs
    Transform {
        /// Which side of the trade ledger to reshape
        #[arg(long, value_enum)]
        flow: Flow,

        /// Root of the raw artifact tree
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Lookup workbook mapping HS codes to commodity descriptions
        #[arg(long)]
        lookup_file: PathBuf,

        /// Directory for the per-code long-format CSVs
        #[arg(long, default_value = "./data/transformed")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let cli = Cli::parse();

    match cli.command {
        Command::Harvest {
            flow,
            codes_file,
            data_dir,
            start_year,
            base_url,
            download_timeout,
        } => {
            run_harvest(
                flow,
                &codes_file,
                &data_dir,
                start_year,
                &base_url,
                download_timeout,
            )
            .await
        }
        Command::Transform {
            flow,
            data_dir,
            lookup_file,
            output_dir,
        } => run_transform(flow, &data_dir, &lookup_file, &output_dir),
    }
}

async fn run_harvest(
    flow: Flow,
    codes_file: &Path,
    data_dir: &Path,
    start_year: i32,
    base_url: &str,
    download_timeout: u64,
) -> Result<(), AppError> {
    // The running month is still accumulating on the portal; the grid
    // stops at the last closed month.
    let through = Period::current().previous();
    if start_year > through.year {
        return Err(AppError::Config(format!(
            "start year {start_year} is beyond the last closed month ({through})"
        )));
    }

    let codes = catalog::read_codes(codes_file)?;
    let store = ArtifactStore::new(data_dir, flow)?;
    let staging_dir = store.staging_dir();
    let session = HttpReportSession::new(base_url, flow, &staging_dir)?;

    let cfg = HarvestConfig {
        start_year,
        through,
        staging_dir,
        reconcile: ReconcileConfig {
            timeout: Duration::from_secs(download_timeout),
            ..Default::default()
        },
    };
    tracing::info!(
        "Starting {} harvest: {} codes, {} through {}",
        flow,
        codes.len(),
        cfg.start_year,
        cfg.through
    );

    harvest::run(&session, &store, &cfg, &codes).await?;
    Ok(())
}

fn run_transform(
    flow: Flow,
    data_dir: &Path,
    lookup_file: &Path,
    output_dir: &Path,
) -> Result<(), AppError> {
    let lookup = catalog::CommodityLookup::from_workbook(lookup_file)?;
    // The store owns the path convention; reuse it to locate the raw tree.
    let store = ArtifactStore::new(data_dir, flow)?;
    tracing::info!(
        "Starting {} transformation: {} -> {}",
        flow,
        store.root().display(),
        output_dir.display()
    );

    transform::run(store.root(), &lookup, output_dir, flow)?;
    Ok(())
}
