//! Normalization layer for KRM dashboard reports.
//!
//! Turns inconsistently shaped CSV exports into canonical records:
//! - `csv_rows`: CSV text → ordered raw rows
//! - `values`: loosely typed cells and boolean coercion
//! - `dates`: leverdatum / timestamp formatting and year extraction
//! - `normalize`: alias lookup and validation/approval derivation
//! - `merge`: validatielijst dedup by latest leverdatum
//! - `report`: validation reports (status-detail files) and per-section counts
//! - `severity`: classification of validation failure reasons
//!
//! Everything here is DETERMINISTIC and free of I/O.

pub mod csv_rows;
pub mod dates;
pub mod logging;
pub mod merge;
pub mod normalize;
pub mod report;
pub mod severity;
pub mod values;

pub use csv_rows::{decode_csv_bytes, parse_csv_rows, CsvOptions, HeaderStyle, ParsedCsv, RawRow};
pub use dates::{compute_deadline, extract_year, format_date};
pub use merge::{extract_validatielijst, merge_latest, ValidatielijstRecord};
pub use normalize::{normalize_row, normalize_rows, CanonicalRecord};
pub use report::{
    clean_record_id, ReportSummary, SectionCount, ValidationReport, ValidationResult,
    ValidationSection,
};
pub use severity::Severity;
pub use values::{parse_boolean, RawValue};
