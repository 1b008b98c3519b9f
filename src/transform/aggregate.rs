// src/transform/aggregate.rs
use std::collections::HashSet;
use std::path::Path;

use crate::transform::LongRecord;

/// Drops later duplicates on (HSCod, Country, Date), keeping the first
/// occurrence. Callers feed records in file-name order, which makes the
/// survivor stable across reruns.
pub fn dedupe(records: Vec<LongRecord>) -> Vec<LongRecord> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let key = (
            record.hs_code.clone(),
            record.country.clone(),
            record.date.clone(),
        );
        if seen.insert(key) {
            kept.push(record);
        }
    }
    kept
}

/// Writes one code's aggregated records as CSV with the canonical
/// `HSCod,Commodity,Value,Country,Date,Type` header.
pub fn write_csv(path: &Path, records: &[LongRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tradestat::Flow;
    use tempfile::tempdir;

    fn record(country: &str, date: &str, value: f64) -> LongRecord {
        LongRecord {
            hs_code: "26030000".to_string(),
            commodity: "Copper ores and concentrates".to_string(),
            value,
            country: country.to_string(),
            date: date.to_string(),
            flow: Flow::Import,
        }
    }

    #[test]
    fn first_occurrence_wins_deterministically() {
        // Same (code, country, date) with conflicting values: the record
        // from the earlier-processed file survives.
        let deduped = dedupe(vec![
            record("Germany", "Apr-2020", 12.5),
            record("Germany", "Apr-2020", 99.0),
            record("Chile", "Apr-2020", 40.0),
        ]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].country, "Germany");
        assert_eq!(deduped[0].value, 12.5);
        assert_eq!(deduped[1].country, "Chile");
    }

    #[test]
    fn distinct_dates_are_not_duplicates() {
        let deduped = dedupe(vec![
            record("Germany", "Apr-2020", 12.5),
            record("Germany", "May-2020", 14.0),
        ]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn csv_output_carries_the_canonical_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("26030000.csv");
        write_csv(&path, &[record("Germany", "Apr-2020", 12.5)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "HSCod,Commodity,Value,Country,Date,Type"
        );
        assert_eq!(
            lines.next().unwrap(),
            "26030000,Copper ores and concentrates,12.5,Germany,Apr-2020,Import"
        );
    }
}
