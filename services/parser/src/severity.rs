//! Severity of validation failures ("uitvalreden") in status-detail reports.

use serde::Serialize;

const HIGH_MARKERS: &[&str] = &["kritiek", "ontbreekt", "fout"];
const MEDIUM_MARKERS: &[&str] = &["ongelijk", "verwachting", "afwijking"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    /// Classify a failure reason by keyword. Empty reasons count as low.
    pub fn from_issue(reason: &str) -> Self {
        if reason.is_empty() {
            return Severity::Low;
        }
        let issue = reason.to_lowercase();
        if HIGH_MARKERS.iter().any(|m| issue.contains(m)) {
            Severity::High
        } else if MEDIUM_MARKERS.iter().any(|m| issue.contains(m)) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Read a severity label in English or Dutch.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "hoog" => Severity::High,
            "medium" | "middel" => Severity::Medium,
            "low" | "laag" => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Unknown => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_issue_high() {
        assert_eq!(Severity::from_issue("Kolom parameter ontbreekt"), Severity::High);
        assert_eq!(Severity::from_issue("KRITIEK: geen geometrie"), Severity::High);
        assert_eq!(Severity::from_issue("Fout in eenheid"), Severity::High);
    }

    #[test]
    fn test_from_issue_medium() {
        assert_eq!(Severity::from_issue("Aantal records ongelijk"), Severity::Medium);
        assert_eq!(Severity::from_issue("Waarde buiten verwachting"), Severity::Medium);
    }

    #[test]
    fn test_from_issue_high_beats_medium() {
        assert_eq!(Severity::from_issue("afwijking: datum ontbreekt"), Severity::High);
    }

    #[test]
    fn test_from_issue_low() {
        assert_eq!(Severity::from_issue(""), Severity::Low);
        assert_eq!(Severity::from_issue("opmerking"), Severity::Low);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(Severity::parse("Hoog"), Severity::High);
        assert_eq!(Severity::parse("medium"), Severity::Medium);
        assert_eq!(Severity::parse(" LAAG "), Severity::Low);
        assert_eq!(Severity::parse("?"), Severity::Unknown);
        assert_eq!(Severity::parse("middel").as_str(), "Medium");
    }
}
