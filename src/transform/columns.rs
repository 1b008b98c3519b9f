// src/transform/columns.rs
use once_cell::sync::Lazy;
use regex::Regex;

// Labels the report template uses for non-value columns.
const SKIP_LABELS: [&str; 4] = ["S.No.", "Country", "(R)", "%Growth"];

// Matches "Apr-2017" and "Apr-Apr2017": a leading alphabetic month token,
// an optional middle token (ignored), and a trailing 4-digit year.
static MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z]+)-?([A-Za-z]*)(\d{4})").expect("Failed to compile MONTH_YEAR_RE")
});

/// One recognized value column of a wide-format artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueColumn {
    pub index: usize,
    pub label: String,
    pub month: String,
    pub year: String,
}

/// Strategy mapping a header label to value-column metadata. The report
/// layout drifts over time; a variant plugs in here without touching the
/// row-extraction logic.
pub trait ColumnClassifier {
    /// `Some` when the label denotes a month/year value column, `None` for
    /// everything else.
    fn classify(&self, index: usize, label: &str) -> Option<ValueColumn>;
}

/// Default classifier for the month-wise commodity report template.
#[derive(Debug, Default)]
pub struct MonthYearClassifier;

impl ColumnClassifier for MonthYearClassifier {
    fn classify(&self, index: usize, label: &str) -> Option<ValueColumn> {
        let label = label.trim();
        if label.is_empty() || SKIP_LABELS.contains(&label) {
            return None;
        }
        // Unrecognized labels are silently excluded: a new annotation column
        // in the template must not break parsing.
        let caps = MONTH_YEAR_RE.captures(label)?;
        Some(ValueColumn {
            index,
            label: label.to_string(),
            month: caps[1].to_string(),
            year: caps[3].to_string(),
        })
    }
}
