//! Validation reports: the per-bundle failure listings written by the
//! validation run and served as status-detail files.
//!
//! Layout: `Section,Databundelcode,Record ID,Uitvalreden,Informatie`, one row
//! per failure. An empty report means the bundle passed every check.

use crate::csv_rows::{parse_csv_rows, CsvOptions, RawRow};
use crate::normalize::first_alias;
use crate::severity::Severity;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::warn;

pub const REPORT_HEADERS: [&str; 5] =
    ["Section", "Databundelcode", "Record ID", "Uitvalreden", "Informatie"];

const SECTION_ALIASES: &[&str] = &["section", "sectie"];
const BUNDLE_ALIASES: &[&str] = &["databundelcode", "data_bundle_code"];
const RECORD_ID_ALIASES: &[&str] = &["record_id", "recordid"];
const REASON_ALIASES: &[&str] = &["uitvalreden"];
const INFO_ALIASES: &[&str] = &["informatie"];

const RECORD_ID_PREFIX: &str = "NL80_";

/// Which check produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationSection {
    GeoControl,
    ColumnCheck,
    ColumnValue,
    CountCheck,
    ParameterCheck,
    ParameterAggregate,
    ValueCheck,
    RuleCheck,
    OtherCheck,
    DateRange,
}

impl ValidationSection {
    pub const ALL: [ValidationSection; 10] = [
        ValidationSection::GeoControl,
        ValidationSection::ColumnCheck,
        ValidationSection::ColumnValue,
        ValidationSection::CountCheck,
        ValidationSection::ParameterCheck,
        ValidationSection::ParameterAggregate,
        ValidationSection::ValueCheck,
        ValidationSection::RuleCheck,
        ValidationSection::OtherCheck,
        ValidationSection::DateRange,
    ];

    /// Label as written in report files.
    pub fn label(self) -> &'static str {
        match self {
            ValidationSection::GeoControl => "Geo controle",
            ValidationSection::ColumnCheck => "Verplichte kolommen controle",
            ValidationSection::ColumnValue => "Kolomwaarde controle",
            ValidationSection::CountCheck => "Aantal controle",
            ValidationSection::ParameterCheck => "Parameter controle",
            ValidationSection::ParameterAggregate => "Parameter verzameling controle",
            ValidationSection::ValueCheck => "Vaste waarden controle",
            ValidationSection::RuleCheck => "Regel controle",
            ValidationSection::OtherCheck => "Overige controle",
            ValidationSection::DateRange => "Datumbereik controle",
        }
    }

    /// Case-insensitive match on the label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|section| section.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for ValidationSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ValidationSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Record ids are stored without the `NL80_` country prefix.
pub fn clean_record_id(raw: &str) -> String {
    raw.replace(RECORD_ID_PREFIX, "")
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub section: ValidationSection,
    pub databundelcode: String,
    pub record_id: String,
    pub uitvalreden: String,
    pub informatie: String,
}

impl ValidationResult {
    pub fn severity(&self) -> Severity {
        Severity::from_issue(&self.uitvalreden)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionCount {
    pub section: ValidationSection,
    pub count: usize,
}

/// Headline numbers of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub is_valid: bool,
    pub failure_count: usize,
    pub failures_by_section: Vec<SectionCount>,
}

/// All failures found for a bundle, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    results: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        section: ValidationSection,
        databundelcode: impl Into<String>,
        record_id: &str,
        uitvalreden: impl Into<String>,
        informatie: impl Into<String>,
    ) {
        self.results.push(ValidationResult {
            section,
            databundelcode: databundelcode.into(),
            record_id: clean_record_id(record_id),
            uitvalreden: uitvalreden.into(),
            informatie: informatie.into(),
        });
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ValidationResult> {
        self.results
    }

    /// No failures means the bundle passed.
    pub fn is_valid(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len()
    }

    /// Failure counts per section, in order of first appearance.
    pub fn failures_by_section(&self) -> Vec<SectionCount> {
        let mut counts: Vec<SectionCount> = Vec::new();
        for result in &self.results {
            match counts.iter_mut().find(|c| c.section == result.section) {
                Some(entry) => entry.count += 1,
                None => counts.push(SectionCount {
                    section: result.section,
                    count: 1,
                }),
            }
        }
        counts
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            is_valid: self.is_valid(),
            failure_count: self.failure_count(),
            failures_by_section: self.failures_by_section(),
        }
    }

    /// Build a report from parsed rows.
    ///
    /// Rows with no bundle code, record id or reason are skipped. A missing
    /// or unknown section label files the row under "Overige controle".
    pub fn from_rows(rows: &[RawRow]) -> Self {
        let mut report = Self::new();
        for row in rows {
            let databundelcode = first_alias(row, BUNDLE_ALIASES);
            let record_id = first_alias(row, RECORD_ID_ALIASES);
            let uitvalreden = first_alias(row, REASON_ALIASES);
            if databundelcode.is_empty() && record_id.is_empty() && uitvalreden.is_empty() {
                continue;
            }

            let label = first_alias(row, SECTION_ALIASES);
            let section = ValidationSection::from_label(&label).unwrap_or_else(|| {
                warn!(label = %label, "Unknown validation section, filing under other checks");
                ValidationSection::OtherCheck
            });

            report.add(
                section,
                databundelcode,
                &record_id,
                uitvalreden,
                first_alias(row, INFO_ALIASES),
            );
        }
        report
    }

    /// Parse report CSV text. Every cell is read as text.
    pub fn from_csv(content: &str) -> Result<Self, csv::Error> {
        let parsed = parse_csv_rows(content, &CsvOptions::validation_report())?;
        Ok(Self::from_rows(&parsed.rows))
    }

    /// Write the report in the layout it is read from.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(REPORT_HEADERS)?;
        for result in &self.results {
            writer.write_record([
                result.section.label(),
                result.databundelcode.as_str(),
                result.record_id.as_str(),
                result.uitvalreden.as_str(),
                result.informatie.as_str(),
            ])?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT_CSV: &str = "Section,Databundelcode,Record ID,Uitvalreden,Informatie\n\
        Verplichte kolommen controle,RWS_2024_01,NL80_000123,Kolom parameter ontbreekt,parameter\n\
        Aantal controle,RWS_2024_01,NL80_000124,Aantal records ongelijk,\"verwacht 10, gevonden 8\"\n\
        Verplichte kolommen controle,RWS_2024_01,90071992547409931,Kolom eenheid ontbreekt,\n";

    // ------------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------------

    #[test]
    fn test_section_labels() {
        assert_eq!(ValidationSection::ALL.len(), 10);
        for section in ValidationSection::ALL {
            assert_eq!(ValidationSection::from_label(section.label()), Some(section));
        }
        assert_eq!(
            ValidationSection::from_label("  datumbereik CONTROLE "),
            Some(ValidationSection::DateRange)
        );
        assert_eq!(ValidationSection::from_label("Onbekend"), None);
    }

    #[test]
    fn test_section_serializes_as_label() {
        let json = serde_json::to_string(&ValidationSection::ParameterAggregate).unwrap();
        assert_eq!(json, "\"Parameter verzameling controle\"");
    }

    // ------------------------------------------------------------------------
    // Record ids
    // ------------------------------------------------------------------------

    #[test]
    fn test_clean_record_id() {
        assert_eq!(clean_record_id("NL80_000123"), "000123");
        assert_eq!(clean_record_id("000123"), "000123");
        assert_eq!(clean_record_id(""), "");
    }

    // ------------------------------------------------------------------------
    // Report
    // ------------------------------------------------------------------------

    #[test]
    fn test_empty_report_is_valid() {
        let report = ValidationReport::new();
        assert!(report.is_valid());
        assert_eq!(report.failure_count(), 0);
        assert!(report.failures_by_section().is_empty());
    }

    #[test]
    fn test_add_cleans_record_id() {
        let mut report = ValidationReport::new();
        report.add(ValidationSection::GeoControl, "B", "NL80_42", "Geometrie fout", "");
        assert!(!report.is_valid());
        assert_eq!(report.results()[0].record_id, "42");
    }

    #[test]
    fn test_from_csv() {
        let report = ValidationReport::from_csv(REPORT_CSV).unwrap();
        assert_eq!(report.failure_count(), 3);

        let first = &report.results()[0];
        assert_eq!(first.section, ValidationSection::ColumnCheck);
        assert_eq!(first.databundelcode, "RWS_2024_01");
        assert_eq!(first.record_id, "000123");
        assert_eq!(first.severity(), Severity::High);

        assert_eq!(report.results()[1].informatie, "verwacht 10, gevonden 8");
        assert_eq!(report.results()[1].severity(), Severity::Medium);
        // Long ids are never read as numbers
        assert_eq!(report.results()[2].record_id, "90071992547409931");
    }

    #[test]
    fn test_failures_by_section_first_seen_order() {
        let report = ValidationReport::from_csv(REPORT_CSV).unwrap();
        assert_eq!(
            report.failures_by_section(),
            vec![
                SectionCount {
                    section: ValidationSection::ColumnCheck,
                    count: 2
                },
                SectionCount {
                    section: ValidationSection::CountCheck,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_unknown_or_missing_section_is_other() {
        let csv = "Section,Databundelcode,Record ID,Uitvalreden,Informatie\n\
                   Nieuwe controle,B,1,Iets,\n";
        let report = ValidationReport::from_csv(csv).unwrap();
        assert_eq!(report.results()[0].section, ValidationSection::OtherCheck);

        let csv = "Record ID,Uitvalreden\n7,Waarde buiten verwachting\n";
        let report = ValidationReport::from_csv(csv).unwrap();
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.results()[0].section, ValidationSection::OtherCheck);
        assert_eq!(report.results()[0].databundelcode, "");
    }

    #[test]
    fn test_rows_without_content_skipped() {
        let csv = "Section,Databundelcode,Record ID,Uitvalreden,Informatie\n\
                   Geo controle,,,,alleen informatie\n";
        let report = ValidationReport::from_csv(csv).unwrap();
        assert!(report.is_valid());
    }

    #[test]
    fn test_to_csv_layout() {
        let mut report = ValidationReport::new();
        report.add(
            ValidationSection::RuleCheck,
            "RWS_2024_01",
            "NL80_9",
            "Regel 4 fout",
            "diepte, eenheid",
        );
        let csv = report.to_csv().unwrap();
        assert_eq!(
            csv,
            "Section,Databundelcode,Record ID,Uitvalreden,Informatie\n\
             Regel controle,RWS_2024_01,9,Regel 4 fout,\"diepte, eenheid\"\n"
        );
        assert_eq!(ValidationReport::from_csv(&csv).unwrap(), report);
    }

    #[test]
    fn test_summary_shape() {
        let report = ValidationReport::from_csv(REPORT_CSV).unwrap();
        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["failureCount"], 3);
        assert_eq!(json["failuresBySection"][0]["section"], "Verplichte kolommen controle");
        assert_eq!(json["failuresBySection"][0]["count"], 2);
    }
}
