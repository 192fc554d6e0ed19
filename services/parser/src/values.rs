//! Loosely-typed CSV cell values and boolean coercion.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// 2^53. Numbers at or beyond it would lose digits as `f64` and stay text.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

fn numeric_re() -> &'static Regex {
    static NUMERIC_RE: OnceLock<Regex> = OnceLock::new();
    NUMERIC_RE.get_or_init(|| {
        Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$")
            .expect("valid numeric cell regex")
    })
}

/// A single cell as it comes out of the CSV reader.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl RawValue {
    /// Dynamic typing for report CSVs: `true`/`TRUE`/`false`/`FALSE` become
    /// booleans, numeric literals below 2^53 in magnitude become numbers,
    /// empty cells become null. Everything else stays text.
    pub fn infer(cell: &str) -> Self {
        match cell {
            "" => RawValue::Null,
            "true" | "TRUE" => RawValue::Bool(true),
            "false" | "FALSE" => RawValue::Bool(false),
            s if numeric_re().is_match(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() && n.abs() < MAX_EXACT_FLOAT => RawValue::Number(n),
                _ => RawValue::Text(s.to_string()),
            },
            s => RawValue::Text(s.to_string()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            RawValue::Text(s) => !s.is_empty(),
            RawValue::Number(n) => *n != 0.0 && !n.is_nan(),
            RawValue::Bool(b) => *b,
            RawValue::Null => false,
        }
    }

    /// Text rendering; null renders as the empty string.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Null => Ok(()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Text(s) => serializer.serialize_str(s),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_FLOAT => {
                serializer.serialize_i64(*n as i64)
            }
            RawValue::Number(n) => serializer.serialize_f64(*n),
            RawValue::Bool(b) => serializer.serialize_bool(*b),
            RawValue::Null => serializer.serialize_unit(),
        }
    }
}

/// Coerce a cell to a boolean.
///
/// Booleans pass through. Text is true only for `true`, `yes` (any case) or
/// exactly `1`. Numbers and nulls fall back to truthiness.
pub fn parse_boolean(value: &RawValue) -> bool {
    match value {
        RawValue::Bool(b) => *b,
        RawValue::Text(s) => {
            let lower = s.to_lowercase();
            lower == "true" || s == "1" || lower == "yes"
        }
        other => other.is_truthy(),
    }
}
