//! CSV text → ordered raw rows.
//!
//! Report CSVs and the validatielijst differ in delimiter, header
//! conventions and typing, so the reader is driven by [`CsvOptions`].

use crate::values::RawValue;
use encoding_rs::{UTF_8, WINDOWS_1252};
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::OnceLock;
use tracing::{debug, warn};

fn whitespace_run_re() -> &'static Regex {
    static WHITESPACE_RUN_RE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE_RUN_RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// One CSV record keyed by (transformed) header name, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    fields: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. Later duplicates are shadowed by the first one.
    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        self.fields.push((key.into(), value));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// How header cells are turned into row keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStyle {
    /// Trim, lowercase, collapse whitespace runs into `_`.
    SnakeLower,
    /// Trim only.
    Trimmed,
}

impl HeaderStyle {
    pub fn apply(self, header: &str) -> String {
        match self {
            HeaderStyle::SnakeLower => whitespace_run_re()
                .replace_all(&header.trim().to_lowercase(), "_")
                .into_owned(),
            HeaderStyle::Trimmed => header.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub header_style: HeaderStyle,
    pub dynamic_typing: bool,
}

impl CsvOptions {
    /// Reports served through the backend: comma separated, snake_case headers, typed cells.
    pub fn report() -> Self {
        Self {
            delimiter: b',',
            header_style: HeaderStyle::SnakeLower,
            dynamic_typing: true,
        }
    }

    /// Validation report exports: comma separated, snake_case headers, every
    /// cell kept as text so record ids survive unchanged.
    pub fn validation_report() -> Self {
        Self {
            delimiter: b',',
            header_style: HeaderStyle::SnakeLower,
            dynamic_typing: false,
        }
    }

    /// The published validatielijst: semicolon separated, headers kept as written.
    pub fn validatielijst() -> Self {
        Self {
            delimiter: b';',
            header_style: HeaderStyle::Trimmed,
            dynamic_typing: false,
        }
    }
}

/// Rows plus the non-fatal problems found while reading them.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub rows: Vec<RawRow>,
    pub warnings: Vec<String>,
}

/// Parse CSV text into raw rows.
///
/// Blank lines are skipped. Lines whose field count differs from the header
/// are kept and reported as warnings; syntax errors abort the parse.
pub fn parse_csv_rows(content: &str, options: &CsvOptions) -> Result<ParsedCsv, csv::Error> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| options.header_style.apply(h))
        .collect();

    let mut parsed = ParsedCsv::default();

    for (line_idx, result) in reader.records().enumerate() {
        let record = result?;
        let line_num = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(line_idx + 2);

        if record.len() == 1 && record.get(0).map_or(false, str::is_empty) {
            continue;
        }

        if record.len() != headers.len() {
            parsed.warnings.push(format!(
                "Line {}: expected {} fields, found {}",
                line_num,
                headers.len(),
                record.len()
            ));
        }

        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            let value = if options.dynamic_typing {
                RawValue::infer(cell)
            } else {
                RawValue::Text(cell.to_string())
            };
            row.insert(header.clone(), value);
        }
        parsed.rows.push(row);
    }

    if !parsed.warnings.is_empty() {
        warn!(count = parsed.warnings.len(), first = %parsed.warnings[0], "CSV parsing warnings");
    }
    debug!(rows = parsed.rows.len(), "Parsed CSV rows");

    Ok(parsed)
}

/// Decode a downloaded body. UTF-8 (BOM removed) when valid, Windows-1252 otherwise.
pub fn decode_csv_bytes(bytes: &[u8]) -> String {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text.into_owned();
    }
    debug!("Body is not valid UTF-8, decoding as windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}
