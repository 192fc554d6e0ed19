//! Collector CLI - Fetches and normalizes KRM dashboard data
//!
//! Usage:
//!   # Report records (falls back to a fixed record on failure):
//!   cargo run --bin collector -- records --object-key rapportages/akkoorddata.csv
//!
//!   # Unique validatielijst entries:
//!   cargo run --bin collector -- validatielijst
//!
//!   # Validation report behind a status-details file:
//!   cargo run --bin collector -- status-details --filename <file.csv>
//!
//!   # Viewer link for a criterion:
//!   cargo run --bin collector -- viewer --criterium "ANSNL-D8C1;ANSNL-D8C2" --not-published

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use krm_collector::{CollectorConfig, CsvSource, PublicationStatus, ViewerResolver};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Fetches KRM report data from its origins")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalized report records
    Records {
        /// Object key in the report bucket (default: KRM_OBJECT_KEY)
        #[arg(long)]
        object_key: Option<String>,

        /// Enter through the pre-signed URL path
        #[arg(long, default_value = "false")]
        via_url: bool,
    },
    /// Unique validatielijst entries
    Validatielijst,
    /// Validation report behind one status-details file
    StatusDetails {
        #[arg(long)]
        filename: String,
    },
    /// Viewer link for a (compound) criterion
    Viewer {
        #[arg(long)]
        criterium: String,

        /// Use the test viewer and test layers
        #[arg(long, default_value = "false")]
        not_published: bool,
    },
    /// Probe the backend endpoint
    Probe,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    krm_parser::logging::init_tracing();
    let args = Args::parse();
    let config = CollectorConfig::from_env();

    info!(api_base = %config.api_base, "KRM collector starting");

    let client = config.build_client().context("Failed to build HTTP client")?;

    match args.command {
        Command::Records { object_key, via_url } => {
            let source = CsvSource::new(client, config);
            let key = object_key.unwrap_or_else(|| source.config().default_object_key.clone());
            let records = if via_url {
                source.fetch_records_via_url(&key).await
            } else {
                source.fetch_records(&key).await
            };
            info!(records = records.len(), "Collected report records");
            print_json(&records)?;
        }
        Command::Validatielijst => {
            let source = CsvSource::new(client, config);
            let records = source.fetch_validatielijst().await?;
            print_json(&records)?;
        }
        Command::StatusDetails { filename } => {
            let source = CsvSource::new(client, config);
            let report = source.fetch_status_details(&filename).await?;
            print_json(&serde_json::json!({
                "summary": report.summary(),
                "results": report.results(),
            }))?;
        }
        Command::Viewer {
            criterium,
            not_published,
        } => {
            let status = if not_published {
                PublicationStatus::NotPublished
            } else {
                PublicationStatus::Published
            };
            let resolver = ViewerResolver::new(client, config);
            let link = resolver
                .cached_viewer_url(&criterium, status)
                .await
                .with_context(|| format!("No viewer layers found for '{}'", criterium))?;
            print_json(&link)?;
        }
        Command::Probe => {
            let source = CsvSource::new(client, config);
            let probe = source.test_api_connection().await?;
            print_json(&probe)?;
        }
    }

    Ok(())
}
