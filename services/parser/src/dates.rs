//! Date helpers for report timestamps and leverdatum (delivery date) values.
//!
//! Reports carry `YYYY-MM-DD HH:MM` timestamps, the validatielijst carries
//! `D-M-YYYY` delivery dates, and some rows carry neither cleanly. None of
//! these functions fail: unparseable input is logged and passed through.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

pub const NO_DATE: &str = "Geen datum";
pub const NO_DELIVERY_DATE: &str = "Geen leverdatum";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

fn year_token_re() -> &'static Regex {
    static YEAR_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    YEAR_TOKEN_RE.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year regex"))
}

/// Render a date for display.
///
/// Delivery dates in `D-M-YYYY` form render as `DD/MM/YYYY`; everything else
/// goes through timestamp parsing and renders as `DD/MM/YYYY, HH:MM`
/// (delivery dates never show a time).
pub fn format_date(raw: &str, is_delivery: bool) -> String {
    if raw.is_empty() {
        return if is_delivery { NO_DELIVERY_DATE } else { NO_DATE }.to_string();
    }

    match render_date(raw, is_delivery) {
        Some(formatted) => formatted,
        None => {
            warn!(raw, is_delivery, "Date formatting error, keeping original value");
            raw.to_string()
        }
    }
}

fn render_date(raw: &str, is_delivery: bool) -> Option<String> {
    if is_delivery {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() == 3 {
            let date = day_month_year(&parts)?;
            return Some(date.format("%d/%m/%Y").to_string());
        }
    }

    let mut pieces = raw.split(' ');
    let date_part = pieces.next().unwrap_or_default();
    let time_part = pieces.next().unwrap_or_default();

    let datetime = if !date_part.is_empty() && !time_part.is_empty() {
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        date.and_time(parse_time(time_part)?)
    } else {
        parse_generic(raw)?
    };

    let pattern = if is_delivery { "%d/%m/%Y" } else { "%d/%m/%Y, %H:%M" };
    Some(datetime.format(pattern).to_string())
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn day_month_year(parts: &[&str]) -> Option<NaiveDate> {
    let day: u32 = parts.first()?.trim().parse().ok()?;
    let month: u32 = parts.get(1)?.trim().parse().ok()?;
    let year: i32 = parts.get(2)?.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Best-effort parse of the timestamp shapes seen in reports.
pub fn parse_generic(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    // Bare year or year-month
    let parts: Vec<&str> = raw.split('-').collect();
    if parts[0].len() == 4 && parts.len() <= 2 {
        let year: i32 = parts[0].parse().ok()?;
        let month: u32 = match parts.get(1) {
            Some(m) => m.parse().ok()?,
            None => 1,
        };
        return NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0);
    }

    None
}

/// Parse a strict `D-M-YYYY` leverdatum.
pub fn parse_delivery_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    day_month_year(&parts)
}

/// Pull a year out of a leverdatum in whatever shape it arrives.
pub fn extract_year(raw: &str) -> Option<i32> {
    if raw.is_empty() {
        return None;
    }

    if raw.contains('-') {
        let parts: Vec<&str> = raw.split('-').collect();

        // 15-9-2022
        if parts.len() == 3 && parts[2].len() == 4 {
            if let Ok(year) = parts[2].parse() {
                return Some(year);
            }
        }

        // 2022-09-15
        if parts.len() >= 3 && parts[0].len() == 4 {
            if let Ok(year) = parts[0].parse() {
                return Some(year);
            }
        }
    }

    if let Some(dt) = parse_generic(raw) {
        return Some(dt.year());
    }

    year_token_re()
        .find(raw)
        .and_then(|m| m.as_str().parse().ok())
}

/// Today (UTC) plus `days_from_now`, as `YYYY-MM-DD`.
pub fn compute_deadline(days_from_now: i64) -> String {
    compute_deadline_from(Utc::now().date_naive(), days_from_now)
}

pub fn compute_deadline_from(today: NaiveDate, days_from_now: i64) -> String {
    Duration::try_days(days_from_now)
        .and_then(|delta| today.checked_add_signed(delta))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string()
}
