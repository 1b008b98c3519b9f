// src/tradestat/models.rs
use chrono::Datelike;
use clap::ValueEnum;
use serde::Serialize;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Which side of the trade ledger a run targets. Selects the portal report
/// tool, the on-disk subtree, and the `Type` column of output records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
pub enum Flow {
    Import,
    Export,
}

impl Flow {
    /// Subtree name under the data directory, e.g. `data/import/...`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Flow::Import => "import",
            Flow::Export => "export",
        }
    }

    /// Path of the portal's commodity-wise report tool for this flow,
    /// relative to the portal base URL.
    pub fn tool_slug(&self) -> &'static str {
        match self {
            Flow::Import => "meidb/commodity_wise_all_countries_import",
            Flow::Export => "meidb/commodity_wise_all_countries_export",
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Flow::Import => "Import",
            Flow::Export => "Export",
        })
    }
}

/// One reporting month. Ordered by (year, month); derive order matches
/// because `year` precedes `month` in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32, // 1-12
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }

    /// The month the wall clock currently sits in.
    pub fn current() -> Self {
        let now = chrono::Local::now();
        Self::new(now.year(), now.month())
    }

    /// The month immediately before this one.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// Full English month name, as used in artifact filenames.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// Every period from January of `start_year` up to and including
    /// `through`, ascending. `through` is the last closed month of the run;
    /// the current month and anything later never appear in the grid.
    pub fn expected_range(start_year: i32, through: Period) -> Vec<Period> {
        let mut periods = Vec::new();
        for year in start_year..=through.year {
            for month in 1..=12 {
                let period = Period::new(year, month);
                if period > through {
                    break;
                }
                periods.push(period);
            }
        }
        periods
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

/// One portal request: a single HS code for a single month.
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub hs_code: String,
    pub period: Period,
}

impl ReportQuery {
    pub fn new(hs_code: impl Into<String>, period: Period) -> Self {
        Self {
            hs_code: hs_code.into(),
            period,
        }
    }
}

/// Result of one report submission. `NoData` is an expected outcome: the
/// portal renders no export control when a query returns zero rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The export was triggered; a download is landing in the staging dir.
    Exported,
    /// The query legitimately has no rows for this period.
    NoData,
}
