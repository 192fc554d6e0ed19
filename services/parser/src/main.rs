//! Parser CLI - Normalizes a local KRM report CSV
//!
//! Responsibilities:
//! - Read a CSV export from disk (UTF-8 or windows-1252)
//! - Apply the same normalization the collector applies to fetched data
//! - Print the result as JSON on stdout
//!
//! Usage:
//!   cargo run --bin parser -- --file akkoorddata.csv
//!   cargo run --bin parser -- --file validatielijst.csv --kind validatielijst --year 2022
//!   cargo run --bin parser -- --file status.csv --kind status-details

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use krm_parser::{
    decode_csv_bytes, extract_validatielijst, extract_year, merge_latest, normalize_rows,
    parse_csv_rows, CsvOptions, ValidationReport,
};
use serde_json::json;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    /// Report CSV with bundle codes and validation status
    Report,
    /// Semicolon separated validatielijst
    Validatielijst,
    /// Validation report (status details) with per-section failures
    StatusDetails,
}

#[derive(Parser, Debug)]
#[command(name = "parser", about = "Normalizes KRM report CSV files")]
struct Args {
    /// Path to the CSV file
    #[arg(long)]
    file: String,

    /// Which layout the file has
    #[arg(long, value_enum, default_value = "report")]
    kind: Kind,

    /// Only keep validatielijst entries delivered in this year
    #[arg(long)]
    year: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    krm_parser::logging::init_tracing();
    let args = Args::parse();

    info!(file = %args.file, kind = ?args.kind, "Reading CSV");

    let bytes = fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file))?;
    let content = decode_csv_bytes(&bytes);

    let output = match args.kind {
        Kind::Report => {
            let parsed = parse_csv_rows(&content, &CsvOptions::report())
                .context("Failed to parse report CSV")?;
            let records = normalize_rows(&parsed.rows);
            info!(rows = parsed.rows.len(), records = records.len(), "Normalized report");
            serde_json::to_value(records)?
        }
        Kind::Validatielijst => {
            let parsed = parse_csv_rows(&content, &CsvOptions::validatielijst())
                .context("Failed to parse validatielijst CSV")?;
            let mut merged = merge_latest(extract_validatielijst(&parsed.rows));
            if let Some(year) = args.year {
                merged.retain(|r| extract_year(&r.delivery_date) == Some(year));
            }
            info!(rows = parsed.rows.len(), unique = merged.len(), "Reduced validatielijst");
            serde_json::to_value(merged)?
        }
        Kind::StatusDetails => {
            let report = ValidationReport::from_csv(&content)
                .context("Failed to parse validation report CSV")?;
            let results: Vec<_> = report
                .results()
                .iter()
                .map(|result| json!({ "result": result, "severity": result.severity() }))
                .collect();
            info!(failures = report.failure_count(), "Parsed validation report");
            json!({ "summary": report.summary(), "results": results })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
