//! API Service - JSON API behind the KRM dashboard
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /records - Normalized report records (fallback on failure)
//! - GET /records/via-url - Same, through the pre-signed URL path
//! - GET /dashboard - Records plus counts and review deadline
//! - GET /validatielijst - Latest validatielijst entry per bundle
//! - GET /status-details - Validation report with per-section counts
//! - GET /viewer-url - Cached viewer link for a criterion
//! - DELETE /viewer-url/cache - Drop cached viewer links
//! - GET /probe - Raw backend probe

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use krm_collector::{CollectorConfig, CsvSource, PublicationStatus, SourceError, ViewerResolver};
use krm_parser::{
    compute_deadline, extract_year, format_date, CanonicalRecord, ReportSummary, Severity,
    ValidatielijstRecord, ValidationReport, ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

// ============================================================================
// Config & state
// ============================================================================

#[derive(Debug, Clone)]
struct ApiConfig {
    bind: String,
    review_deadline_days: i64,
}

impl ApiConfig {
    fn from_env() -> Self {
        Self {
            bind: std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            review_deadline_days: std::env::var("REVIEW_DEADLINE_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(14),
        }
    }
}

struct AppState {
    source: CsvSource,
    viewer: ViewerResolver,
    review_deadline_days: i64,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    #[serde(flatten)]
    record: CanonicalRecord,
    last_updated_display: String,
}

impl From<CanonicalRecord> for RecordView {
    fn from(record: CanonicalRecord) -> Self {
        let last_updated_display = format_date(&record.last_updated, false);
        Self {
            record,
            last_updated_display,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardSummary {
    total: usize,
    validated: usize,
    approved: usize,
    fully_accepted: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    object_key: String,
    summary: DashboardSummary,
    review_deadline: String,
    generated_at: DateTime<Utc>,
    records: Vec<RecordView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidatielijstView {
    #[serde(flatten)]
    record: ValidatielijstRecord,
    delivery_date_display: String,
    year: Option<i32>,
}

#[derive(Serialize)]
struct ValidatielijstResponse {
    year: Option<i32>,
    total: usize,
    records: Vec<ValidatielijstView>,
}

#[derive(Serialize)]
struct StatusDetailRow {
    #[serde(flatten)]
    result: ValidationResult,
    severity: Severity,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusDetailsResponse {
    filename: String,
    #[serde(flatten)]
    summary: ReportSummary,
    results: Vec<StatusDetailRow>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct RecordsQuery {
    #[serde(rename = "objectKey")]
    object_key: Option<String>,
}

#[derive(Deserialize)]
struct ValidatielijstQuery {
    year: Option<i32>,
}

#[derive(Deserialize)]
struct StatusDetailsQuery {
    filename: String,
}

#[derive(Deserialize)]
struct ViewerQuery {
    criterium: String,
    #[serde(rename = "publicationStatus")]
    publication_status: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Translated lookup failures keep their meaning; anything else is an upstream fault.
fn status_for(err: &SourceError) -> StatusCode {
    match err {
        SourceError::NotFound { .. } => StatusCode::NOT_FOUND,
        SourceError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn summarize(records: &[CanonicalRecord]) -> DashboardSummary {
    DashboardSummary {
        total: records.len(),
        validated: records.iter().filter(|r| r.validated).count(),
        approved: records.iter().filter(|r| r.approved).count(),
        fully_accepted: records.iter().filter(|r| r.validated && r.approved).count(),
    }
}

fn validatielijst_views(
    records: Vec<ValidatielijstRecord>,
    year: Option<i32>,
) -> Vec<ValidatielijstView> {
    records
        .into_iter()
        .map(|record| ValidatielijstView {
            delivery_date_display: format_date(&record.delivery_date, true),
            year: extract_year(&record.delivery_date),
            record,
        })
        .filter(|view| year.is_none() || view.year == year)
        .collect()
}

fn status_details_response(filename: String, report: ValidationReport) -> StatusDetailsResponse {
    let summary = report.summary();
    let results = report
        .into_results()
        .into_iter()
        .map(|result| StatusDetailRow {
            severity: result.severity(),
            result,
        })
        .collect();
    StatusDetailsResponse {
        filename,
        summary,
        results,
    }
}

fn object_key(state: &AppState, params: RecordsQuery) -> String {
    params
        .object_key
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| state.source.config().default_object_key.clone())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn records_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordsQuery>,
) -> Json<Vec<RecordView>> {
    let key = object_key(&state, params);
    let records = state.source.fetch_records(&key).await;
    Json(records.into_iter().map(RecordView::from).collect())
}

async fn records_via_url_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordsQuery>,
) -> Json<Vec<RecordView>> {
    let key = object_key(&state, params);
    let records = state.source.fetch_records_via_url(&key).await;
    Json(records.into_iter().map(RecordView::from).collect())
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordsQuery>,
) -> Json<DashboardResponse> {
    let key = object_key(&state, params);
    let records = state.source.fetch_records(&key).await;
    let summary = summarize(&records);

    Json(DashboardResponse {
        object_key: key,
        summary,
        review_deadline: compute_deadline(state.review_deadline_days),
        generated_at: Utc::now(),
        records: records.into_iter().map(RecordView::from).collect(),
    })
}

async fn validatielijst_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ValidatielijstQuery>,
) -> Response {
    match state.source.fetch_validatielijst().await {
        Ok(records) => {
            let views = validatielijst_views(records, params.year);
            Json(ValidatielijstResponse {
                year: params.year,
                total: views.len(),
                records: views,
            })
            .into_response()
        }
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

async fn status_details_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusDetailsQuery>,
) -> Response {
    match state.source.fetch_status_details(&params.filename).await {
        Ok(report) => Json(status_details_response(params.filename, report)).into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

async fn viewer_url_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewerQuery>,
) -> Response {
    let status = PublicationStatus::parse(params.publication_status.as_deref().unwrap_or_default());
    match state.viewer.cached_viewer_url(&params.criterium, status).await {
        Some(link) => Json(link).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Geen viewer lagen gevonden voor: {}", params.criterium),
        ),
    }
}

async fn clear_viewer_cache_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.viewer.clear_cache();
    StatusCode::NO_CONTENT
}

async fn probe_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.source.test_api_connection().await {
        Ok(probe) => Json(probe).into_response(),
        Err(e) => {
            warn!(error = %e, "Backend probe failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    krm_parser::logging::init_tracing();

    let config = ApiConfig::from_env();
    let collector = CollectorConfig::from_env();

    println!("=== KRM Dashboard API ===");
    info!(api_base = %collector.api_base, "Using backend");

    let client = collector
        .build_client()
        .context("Failed to build HTTP client")?;

    let state = Arc::new(AppState {
        source: CsvSource::new(client.clone(), collector.clone()),
        viewer: ViewerResolver::new(client, collector),
        review_deadline_days: config.review_deadline_days,
    });

    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/records", get(records_handler))
        .route("/records/via-url", get(records_via_url_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/validatielijst", get(validatielijst_handler))
        .route("/status-details", get(status_details_handler))
        .route("/viewer-url", get(viewer_url_handler))
        .route("/viewer-url/cache", delete(clear_viewer_cache_handler))
        .route("/probe", get(probe_handler))
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", config.bind);
    println!("\nEndpoints:");
    println!("  GET /health");
    println!("  GET /records?objectKey=");
    println!("  GET /records/via-url?objectKey=");
    println!("  GET /dashboard?objectKey=");
    println!("  GET /validatielijst?year=");
    println!("  GET /status-details?filename=");
    println!("  GET /viewer-url?criterium=&publicationStatus=");
    println!("  DELETE /viewer-url/cache");
    println!("  GET /probe");

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use krm_parser::ValidationSection;

    fn record(bundle: &str, validated: bool, approved: bool) -> CanonicalRecord {
        CanonicalRecord {
            bundle_code: bundle.to_string(),
            criterion: "ANSNL-D8C1".to_string(),
            last_updated: "2024-07-02 08:43".to_string(),
            validated,
            approved,
            status: String::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Dashboard summary
    // ------------------------------------------------------------------------

    #[test]
    fn test_summarize_counts() {
        let records = vec![
            record("A", true, true),
            record("B", true, false),
            record("C", false, true),
            record("D", false, false),
        ];
        assert_eq!(
            summarize(&records),
            DashboardSummary {
                total: 4,
                validated: 2,
                approved: 2,
                fully_accepted: 1,
            }
        );
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.fully_accepted, 0);
    }

    #[test]
    fn test_record_view_shape() {
        let view = RecordView::from(record("A", true, false));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["bundleCode"], "A");
        assert_eq!(json["validated"], true);
        assert_eq!(json["lastUpdated"], "2024-07-02 08:43");
        assert_eq!(json["lastUpdatedDisplay"], "02/07/2024, 08:43");
    }

    // ------------------------------------------------------------------------
    // Validatielijst
    // ------------------------------------------------------------------------

    #[test]
    fn test_validatielijst_year_filter() {
        let records = vec![
            ValidatielijstRecord::new("A", "ANSNL-D8C1", "15-9-2022"),
            ValidatielijstRecord::new("B", "ANSNL-D5C2", "3-3-2021"),
            ValidatielijstRecord::new("C", "ANSNL-D6C2", "onbekend"),
        ];

        let all = validatielijst_views(records.clone(), None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].year, Some(2022));
        assert_eq!(all[0].delivery_date_display, "15/09/2022");
        assert_eq!(all[2].year, None);

        let only_2021 = validatielijst_views(records, Some(2021));
        assert_eq!(only_2021.len(), 1);
        assert_eq!(only_2021[0].record.bundle_code, "B");
    }

    // ------------------------------------------------------------------------
    // Status details
    // ------------------------------------------------------------------------

    #[test]
    fn test_status_details_response() {
        let mut report = ValidationReport::new();
        report.add(
            ValidationSection::ColumnCheck,
            "RWS_2024_01",
            "NL80_000001",
            "Kolom parameter ontbreekt",
            "",
        );
        report.add(
            ValidationSection::CountCheck,
            "RWS_2024_01",
            "NL80_000002",
            "Aantal records ongelijk",
            "verwacht 3",
        );
        report.add(
            ValidationSection::ColumnCheck,
            "RWS_2024_01",
            "NL80_000003",
            "Kolom eenheid ontbreekt",
            "",
        );

        let response = status_details_response("status_rws.csv".to_string(), report);
        assert_eq!(response.results[0].severity, Severity::High);
        assert_eq!(response.results[1].severity, Severity::Medium);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["filename"], "status_rws.csv");
        assert_eq!(json["isValid"], false);
        assert_eq!(json["failureCount"], 3);
        assert_eq!(json["failuresBySection"][0]["section"], "Verplichte kolommen controle");
        assert_eq!(json["failuresBySection"][0]["count"], 2);
        assert_eq!(json["failuresBySection"][1]["section"], "Aantal controle");
        assert_eq!(json["results"][0]["recordId"], "000001");
        assert_eq!(json["results"][0]["severity"], "High");
        assert_eq!(json["results"][1]["informatie"], "verwacht 3");
    }

    #[test]
    fn test_status_details_response_valid_bundle() {
        let response = status_details_response("ok.csv".to_string(), ValidationReport::new());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["failureCount"], 0);
        assert_eq!(json["failuresBySection"], serde_json::json!([]));
    }

    #[test]
    fn test_status_for_source_errors() {
        let not_found = SourceError::NotFound {
            title: "Status details bestand",
            name: "x.csv".to_string(),
        };
        assert_eq!(status_for(&not_found), StatusCode::NOT_FOUND);

        let denied = SourceError::AccessDenied {
            noun: "status details bestand",
        };
        assert_eq!(status_for(&denied), StatusCode::FORBIDDEN);

        let other = SourceError::Fetch(krm_collector::FetchError::MissingDownloadUrl);
        assert_eq!(status_for(&other), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_config_defaults() {
        std::env::remove_var("API_BIND");
        std::env::remove_var("REVIEW_DEADLINE_DAYS");
        let config = ApiConfig::from_env();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.review_deadline_days, 14);
    }
}
