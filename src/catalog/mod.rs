// src/catalog/mod.rs
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::utils::error::CatalogError;

// Lookup workbook header labels, matched case-insensitively after trimming.
const CODE_COLUMN: &str = "cleaned itc code";
const DESCRIPTION_COLUMN: &str = "description";

/// Reads the HS code catalog: one code per line, `#` comments and blank
/// lines ignored, order preserved. An absent or empty file is fatal — the
/// run would have nothing to process.
pub fn read_codes(path: &Path) -> Result<Vec<String>, CatalogError> {
    let text = fs::read_to_string(path)?;
    let codes: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if codes.is_empty() {
        return Err(CatalogError::Empty(path.display().to_string()));
    }

    tracing::info!("Loaded {} HS codes from {}", codes.len(), path.display());
    Ok(codes)
}

/// Maps an HS code to its human-readable commodity description.
pub struct CommodityLookup {
    map: HashMap<String, String>,
}

impl CommodityLookup {
    /// Loads the mapping from the first sheet of the lookup workbook. The
    /// code and description columns are located by normalized header label,
    /// not by position.
    pub fn from_workbook(path: &Path) -> Result<Self, CatalogError> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet_names = workbook.sheet_names().to_vec();
        let first = sheet_names
            .first()
            .ok_or(CatalogError::Workbook(calamine::Error::Msg(
                "lookup workbook contains no sheets",
            )))?;
        let range = workbook.worksheet_range(first)?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| CatalogError::MissingColumn(CODE_COLUMN.to_string()))?;
        let code_col = find_column(header, CODE_COLUMN)
            .ok_or_else(|| CatalogError::MissingColumn(CODE_COLUMN.to_string()))?;
        let desc_col = find_column(header, DESCRIPTION_COLUMN)
            .ok_or_else(|| CatalogError::MissingColumn(DESCRIPTION_COLUMN.to_string()))?;

        let mut map = HashMap::new();
        for row in rows {
            let code = normalize_code(row.get(code_col));
            if code.is_empty() {
                continue;
            }
            let description = match row.get(desc_col) {
                Some(Data::String(s)) => s.trim().to_string(),
                Some(Data::Empty) | None => String::new(),
                Some(other) => other.to_string(),
            };
            if description.is_empty() {
                continue;
            }
            map.insert(code, description);
        }

        tracing::info!("Loaded {} HS code mappings from {}", map.len(), path.display());
        Ok(Self { map })
    }

    /// Builds a lookup from an in-memory mapping.
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// Description for a code. A miss is non-fatal: the record keeps a
    /// recognizable placeholder instead of being dropped.
    pub fn describe(&self, hs_code: &str) -> String {
        self.map
            .get(hs_code)
            .cloned()
            .unwrap_or_else(|| format!("Unknown Commodity ({hs_code})"))
    }
}

fn find_column(header: &[Data], wanted: &str) -> Option<usize> {
    header.iter().position(|cell| {
        let label = match cell {
            Data::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        label.eq_ignore_ascii_case(wanted)
    })
}

/// Codes arrive as text or as numeric cells; both normalize to the plain
/// digit string used as the lookup key.
fn normalize_code(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Float(f)) if f.fract() == 0.0 => format!("{}", *f as i64),
        Some(Data::Float(f)) => f.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_codes_skips_comments_and_blanks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hscodes.txt");
        fs::write(&path, "# critical minerals\n26030000\n\n  72029990  \n#trailing\n").unwrap();

        let codes = read_codes(&path).unwrap();
        assert_eq!(codes, vec!["26030000", "72029990"]);
    }

    #[test]
    fn read_codes_missing_file_is_fatal() {
        let dir = tempdir().unwrap();
        let err = read_codes(&dir.path().join("absent.txt"));
        assert!(matches!(err, Err(CatalogError::Io(_))));
    }

    #[test]
    fn read_codes_empty_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hscodes.txt");
        fs::write(&path, "# only comments\n\n").unwrap();
        assert!(matches!(read_codes(&path), Err(CatalogError::Empty(_))));
    }

    #[test]
    fn describe_falls_back_to_placeholder_on_miss() {
        let mut map = HashMap::new();
        map.insert("26030000".to_string(), "Copper ores and concentrates".to_string());
        let lookup = CommodityLookup::from_map(map);

        assert_eq!(lookup.describe("26030000"), "Copper ores and concentrates");
        assert_eq!(lookup.describe("99999999"), "Unknown Commodity (99999999)");
    }

    #[test]
    fn numeric_codes_normalize_to_digit_strings() {
        assert_eq!(normalize_code(Some(&Data::Float(26030000.0))), "26030000");
        assert_eq!(normalize_code(Some(&Data::Int(72029990))), "72029990");
        assert_eq!(normalize_code(Some(&Data::String(" 28053000 ".into()))), "28053000");
        assert_eq!(normalize_code(Some(&Data::Empty)), "");
        assert_eq!(normalize_code(None), "");
    }
}
