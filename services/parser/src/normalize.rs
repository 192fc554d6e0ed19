//! Raw report rows → canonical records.
//!
//! Report exports are not consistent about column spelling, so each canonical
//! field has an ordered alias list. The first alias holding a non-empty value
//! wins. Validation and approval flags come either from explicit columns or
//! from the free-text status message written by the validation backend.

use crate::csv_rows::RawRow;
use crate::values::{parse_boolean, RawValue};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const BUNDLE_CODE_ALIASES: &[&str] = &["databundelcode", "data_bundle_code", "Data Bundle Code"];
pub const CRITERION_ALIASES: &[&str] = &["krmcriterium", "krm_criterium", "KRM Criterium"];
pub const LAST_UPDATED_ALIASES: &[&str] = &["last_updated", "updated", "Last Updated"];

const VALIDATION_FIELD: &str = "validation";
const APPROVAL_FIELD: &str = "approval";
const STATUS_FIELD: &str = "status";

fn validation_status_re() -> &'static Regex {
    static VALIDATION_STATUS_RE: OnceLock<Regex> = OnceLock::new();
    VALIDATION_STATUS_RE.get_or_init(|| {
        Regex::new(r"(?i)validatie is: (True|False)").expect("valid validation status regex")
    })
}

fn approval_status_re() -> &'static Regex {
    static APPROVAL_STATUS_RE: OnceLock<Regex> = OnceLock::new();
    APPROVAL_STATUS_RE.get_or_init(|| {
        Regex::new(r"(?i)akkoord file is: (True|False)").expect("valid approval status regex")
    })
}

/// A report row in the one shape the dashboard understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub bundle_code: String,
    pub criterion: String,
    pub last_updated: String,
    pub validated: bool,
    pub approved: bool,
    pub status: String,
}

/// First alias with a truthy value, rendered as text.
pub fn first_alias(row: &RawRow, aliases: &[&str]) -> String {
    aliases
        .iter()
        .filter_map(|alias| row.get(alias))
        .find(|value| value.is_truthy())
        .map(RawValue::to_text)
        .unwrap_or_default()
}

fn status_text(row: &RawRow) -> Option<String> {
    row.get(STATUS_FIELD)
        .filter(|value| value.is_truthy())
        .map(RawValue::to_text)
}

/// `True`/`False` captured from a status message; no match reads as false.
fn flag_from_status(status: &str, re: &Regex) -> bool {
    re.captures(status)
        .and_then(|caps| caps.get(1))
        .map_or(false, |m| m.as_str().eq_ignore_ascii_case("true"))
}

fn derive_flag(row: &RawRow, field: &str, status: Option<&str>, re: &Regex) -> bool {
    if let Some(value) = row.get(field) {
        return parse_boolean(value);
    }
    match status {
        Some(text) => flag_from_status(text, re),
        None => false,
    }
}

/// Normalize one row. Rows without a bundle code yield `None`.
pub fn normalize_row(row: &RawRow) -> Option<CanonicalRecord> {
    let bundle_code = first_alias(row, BUNDLE_CODE_ALIASES);
    if bundle_code.is_empty() {
        return None;
    }

    let status = status_text(row);
    let validated = derive_flag(row, VALIDATION_FIELD, status.as_deref(), validation_status_re());
    let approved = derive_flag(row, APPROVAL_FIELD, status.as_deref(), approval_status_re());

    Some(CanonicalRecord {
        bundle_code,
        criterion: first_alias(row, CRITERION_ALIASES),
        last_updated: first_alias(row, LAST_UPDATED_ALIASES),
        validated,
        approved,
        status: status
            .unwrap_or_else(|| format!("Validatie: {}, Akkoord: {}", validated, approved)),
    })
}

/// Normalize a batch, dropping rows without a bundle code. Duplicates are kept.
pub fn normalize_rows(rows: &[RawRow]) -> Vec<CanonicalRecord> {
    rows.iter().filter_map(normalize_row).collect()
}
