//! Validatielijst reduction: one entry per bundle code, latest leverdatum wins.

use crate::csv_rows::RawRow;
use crate::dates::parse_delivery_date;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatielijstRecord {
    pub bundle_code: String,
    pub criteria: String,
    pub delivery_date: String,
}

impl ValidatielijstRecord {
    pub fn new(
        bundle_code: impl Into<String>,
        criteria: impl Into<String>,
        delivery_date: impl Into<String>,
    ) -> Self {
        Self {
            bundle_code: bundle_code.into(),
            criteria: criteria.into(),
            delivery_date: delivery_date.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.bundle_code.is_empty() && !self.criteria.is_empty() && !self.delivery_date.is_empty()
    }
}

fn cell(row: &RawRow, key: &str) -> String {
    row.get(key)
        .filter(|value| value.is_truthy())
        .map(|value| value.to_text())
        .unwrap_or_default()
}

/// Project validatielijst rows onto the three columns the dashboard needs.
pub fn extract_validatielijst(rows: &[RawRow]) -> Vec<ValidatielijstRecord> {
    rows.iter()
        .map(|row| {
            ValidatielijstRecord::new(
                cell(row, "databundelcode"),
                cell(row, "criteria"),
                cell(row, "leverdatum"),
            )
        })
        .collect()
}

/// Collapse duplicates by bundle code.
///
/// Incomplete entries are dropped. A later duplicate replaces the stored one
/// only when its leverdatum is strictly later; if either date cannot be
/// parsed the stored entry stays. Output is in first-insertion order.
pub fn merge_latest<I>(records: I) -> Vec<ValidatielijstRecord>
where
    I: IntoIterator<Item = ValidatielijstRecord>,
{
    let mut merged: Vec<ValidatielijstRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen = 0usize;

    for record in records {
        seen += 1;
        if !record.is_complete() {
            continue;
        }

        let Some(&slot) = index.get(&record.bundle_code) else {
            index.insert(record.bundle_code.clone(), merged.len());
            merged.push(record);
            continue;
        };

        let existing = &merged[slot];
        match (
            parse_delivery_date(&existing.delivery_date),
            parse_delivery_date(&record.delivery_date),
        ) {
            (Some(existing_date), Some(incoming_date)) => {
                if incoming_date > existing_date {
                    merged[slot] = record;
                }
            }
            _ => {
                warn!(
                    bundle_code = %record.bundle_code,
                    existing = %existing.delivery_date,
                    incoming = %record.delivery_date,
                    "Date parsing error, keeping first occurrence"
                );
            }
        }
    }

    debug!(rows = seen, unique = merged.len(), "Reduced validatielijst to unique databundels");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(code: &str, date: &str) -> ValidatielijstRecord {
        ValidatielijstRecord::new(code, "ANSNL-D8C1", date)
    }

    #[test]
    fn test_latest_date_wins() {
        let merged = merge_latest(vec![rec("A", "1-1-2020"), rec("A", "15-9-2022")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bundle_code, "A");
        assert_eq!(merged[0].delivery_date, "15-9-2022");
    }

    #[test]
    fn test_earlier_date_does_not_replace() {
        let merged = merge_latest(vec![rec("A", "15-9-2022"), rec("A", "1-1-2020")]);
        assert_eq!(merged[0].delivery_date, "15-9-2022");
    }

    #[test]
    fn test_equal_dates_keep_first() {
        let first = ValidatielijstRecord::new("A", "first", "1-1-2020");
        let second = ValidatielijstRecord::new("A", "second", "01-01-2020");
        let merged = merge_latest(vec![first, second]);
        assert_eq!(merged[0].criteria, "first");
    }

    #[test]
    fn test_unparseable_incoming_keeps_first() {
        let merged = merge_latest(vec![rec("A", "1-1-2020"), rec("A", "onbekend")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].delivery_date, "1-1-2020");
    }

    #[test]
    fn test_unparseable_existing_keeps_first() {
        let merged = merge_latest(vec![rec("A", "2020/01/01"), rec("A", "15-9-2022")]);
        assert_eq!(merged[0].delivery_date, "2020/01/01");
    }

    #[test]
    fn test_incomplete_entries_dropped() {
        let merged = merge_latest(vec![
            ValidatielijstRecord::new("", "ANSNL-D8C1", "1-1-2020"),
            ValidatielijstRecord::new("B", "", "1-1-2020"),
            ValidatielijstRecord::new("C", "ANSNL-D8C1", ""),
            rec("D", "1-1-2020"),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bundle_code, "D");
    }

    #[test]
    fn test_first_insertion_order() {
        let merged = merge_latest(vec![
            rec("B", "1-1-2020"),
            rec("A", "1-1-2020"),
            rec("B", "2-2-2021"),
            rec("C", "1-1-2020"),
        ]);
        let codes: Vec<&str> = merged.iter().map(|r| r.bundle_code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "C"]);
        assert_eq!(merged[0].delivery_date, "2-2-2021");
    }

    #[test]
    fn test_extract_projects_columns() {
        let rows = vec![RawRow::new()
            .with("databundelcode", "A")
            .with("criteria", "ANSNL-D8C1;ANSNL-D8C2")
            .with("leverdatum", "15-9-2022")
            .with("opmerking", "genegeerd")];
        let extracted = extract_validatielijst(&rows);
        assert_eq!(
            extracted,
            vec![ValidatielijstRecord::new("A", "ANSNL-D8C1;ANSNL-D8C2", "15-9-2022")]
        );
    }

    #[test]
    fn test_extract_missing_columns_are_empty() {
        let rows = vec![RawRow::new().with("databundelcode", "A")];
        let extracted = extract_validatielijst(&rows);
        assert_eq!(extracted[0].criteria, "");
        assert!(merge_latest(extracted).is_empty());
    }
}
