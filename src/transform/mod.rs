// src/transform/mod.rs
pub mod aggregate;
pub mod columns;

use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::CommodityLookup;
use crate::storage::STAGING_DIR_NAME;
use crate::tradestat::Flow;
use crate::utils::error::{AppError, TransformError};
use columns::{ColumnClassifier, MonthYearClassifier, ValueColumn};

// The portal's fixed report template: two banner rows above the real
// header, data from the row after the header.
pub const HEADER_ROW: usize = 2;
pub const DATA_START_ROW: usize = 3;

// Country cells carrying these tokens are placeholder rows, not countries.
const NULL_MARKERS: [&str; 3] = ["", "nan", "None"];

/// One observation in the canonical long format. The serde renames produce
/// the exact output column names downstream consumers key on.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LongRecord {
    #[serde(rename = "HSCod")]
    pub hs_code: String,
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Country")]
    pub country: String,
    /// `"<MonthToken>-<Year>"`, e.g. `"Apr-2020"`.
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Type")]
    pub flow: Flow,
}

/// Per-artifact header layout: the recognized value columns plus the
/// country column. Recomputed for every file, never persisted.
#[derive(Debug)]
struct HeaderLayout {
    value_columns: Vec<ValueColumn>,
    country_col: usize,
}

fn detect_layout(
    header: &[Data],
    classifier: &dyn ColumnClassifier,
) -> Result<HeaderLayout, TransformError> {
    let labels: Vec<String> = header.iter().map(cell_text).collect();

    // Rows are unattributable without a country column; reject the artifact.
    let country_col = labels
        .iter()
        .position(|label| label.trim().eq_ignore_ascii_case("country"))
        .ok_or(TransformError::MissingCountryColumn)?;

    let value_columns: Vec<ValueColumn> = labels
        .iter()
        .enumerate()
        .filter_map(|(index, label)| classifier.classify(index, label))
        .collect();
    if value_columns.is_empty() {
        return Err(TransformError::NoValueColumns);
    }
    for column in &value_columns {
        tracing::trace!(
            "value column '{}' -> {}-{}",
            column.label,
            column.month,
            column.year
        );
    }

    Ok(HeaderLayout {
        value_columns,
        country_col,
    })
}

/// Transforms one wide-format grid into long records. Pure over in-memory
/// cells; `transform_workbook` is the calamine front-end.
pub fn transform_grid(
    rows: &[Vec<Data>],
    hs_code: &str,
    commodity: &str,
    flow: Flow,
    classifier: &dyn ColumnClassifier,
) -> Result<Vec<LongRecord>, TransformError> {
    if rows.len() <= HEADER_ROW {
        return Err(TransformError::TooShort);
    }
    let layout = detect_layout(&rows[HEADER_ROW], classifier)?;

    let mut records = Vec::new();
    for row in rows.iter().skip(DATA_START_ROW) {
        let country = row
            .get(layout.country_col)
            .map(cell_text)
            .unwrap_or_default();
        let country = country.trim();
        if NULL_MARKERS.contains(&country) {
            continue;
        }

        for column in &layout.value_columns {
            // Blank cells and non-numeric markers (footnotes, dashes) are
            // dropped, never read as zero.
            let Some(value) = row.get(column.index).and_then(cell_number) else {
                continue;
            };
            records.push(LongRecord {
                hs_code: hs_code.to_string(),
                commodity: commodity.to_string(),
                value,
                country: country.to_string(),
                date: format!("{}-{}", column.month, column.year),
                flow,
            });
        }
    }
    Ok(records)
}

/// Reads the first sheet of a raw artifact and runs the grid transform.
pub fn transform_workbook(
    path: &Path,
    hs_code: &str,
    commodity: &str,
    flow: Flow,
) -> Result<Vec<LongRecord>, TransformError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names.first().ok_or(TransformError::NoSheets)?;
    let range = workbook.worksheet_range(first)?;
    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    transform_grid(&rows, hs_code, commodity, flow, &MonthYearClassifier)
}

/// Counters for one transform run.
#[derive(Debug, Default)]
pub struct TransformSummary {
    pub codes_processed: usize,
    pub codes_skipped: usize,
    pub files_parsed: usize,
    pub files_rejected: usize,
    pub records: usize,
}

/// Concatenates all monthly artifacts of one code in file-name order and
/// deduplicates. A malformed artifact is logged and skipped; the remaining
/// files still contribute.
fn transform_code_dir(
    dir: &Path,
    hs_code: &str,
    commodity: &str,
    flow: Flow,
    summary: &mut TransformSummary,
) -> Result<Vec<LongRecord>, AppError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
        })
        .collect();
    files.sort();
    tracing::info!("  Found {} monthly files", files.len());

    let mut all = Vec::new();
    for path in &files {
        match transform_workbook(path, hs_code, commodity, flow) {
            Ok(records) => {
                tracing::debug!("  {}: {} records", path.display(), records.len());
                summary.files_parsed += 1;
                all.extend(records);
            }
            Err(e) => {
                tracing::warn!("  Skipping {}: {}", path.display(), e);
                summary.files_rejected += 1;
            }
        }
    }
    Ok(aggregate::dedupe(all))
}

/// Walks the flow subtree and writes one aggregated long-format CSV per
/// code directory.
pub fn run(
    source_root: &Path,
    lookup: &CommodityLookup,
    output_dir: &Path,
    flow: Flow,
) -> Result<TransformSummary, AppError> {
    fs::create_dir_all(output_dir)?;

    let mut code_dirs: Vec<PathBuf> = fs::read_dir(source_root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name != STAGING_DIR_NAME)
        })
        .collect();
    code_dirs.sort();
    tracing::info!(
        "Found {} HS code directories under {}",
        code_dirs.len(),
        source_root.display()
    );

    let mut summary = TransformSummary::default();
    for dir in &code_dirs {
        let Some(hs_code) = dir.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let commodity = lookup.describe(hs_code);
        tracing::info!("Processing HS code: {} - {}", hs_code, commodity);

        let records = transform_code_dir(dir, hs_code, &commodity, flow, &mut summary)?;
        if records.is_empty() {
            tracing::warn!("No data extracted for {}", hs_code);
            summary.codes_skipped += 1;
            continue;
        }

        let out_path = output_dir.join(format!("{hs_code}.csv"));
        aggregate::write_csv(&out_path, &records)?;
        tracing::info!(
            "  {} records for {} -> {}",
            records.len(),
            hs_code,
            out_path.display()
        );
        summary.codes_processed += 1;
        summary.records += records.len();
    }

    tracing::info!(
        "Transformation complete. codes processed: {}, skipped: {}, files parsed: {}, rejected: {}, records: {}",
        summary.codes_processed,
        summary.codes_skipped,
        summary.files_parsed,
        summary.files_rejected,
        summary.records
    );
    Ok(summary)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
