//! Data source adapter.
//!
//! Two ways in:
//! - Report CSVs behind the backend: ask the backend for a pre-signed URL,
//!   download the object, parse it. Failures fall back to a fixed dataset so
//!   the dashboard always has something to show.
//! - The public validatielijst and status-detail reports: same download
//!   mechanics, but failures are translated and returned to the caller.

use crate::config::CollectorConfig;
use crate::error::{FetchError, SourceError, STATUS_DETAILS, VALIDATIELIJST};
use krm_parser::{
    decode_csv_bytes, extract_validatielijst, merge_latest, normalize_rows, parse_csv_rows,
    CanonicalRecord, CsvOptions, RawRow, ValidatielijstRecord, ValidationReport,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

/// Shown when the report cannot be fetched.
pub fn fallback_records() -> Vec<CanonicalRecord> {
    vec![CanonicalRecord {
        bundle_code: "RWS_2023_05+vervuiling+vis+20240702_1580_rev".to_string(),
        criterion: "ANSNL-D8C1".to_string(),
        last_updated: "4-3-2025 08:43".to_string(),
        validated: false,
        approved: false,
        status: "Databundel validatie is: False en akkoord file is: False".to_string(),
    }]
}

#[derive(Debug, Deserialize)]
struct PresignResponse {
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
}

/// Raw result of probing the backend endpoint.
#[derive(Debug, Serialize)]
pub struct ApiProbe {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CsvSource {
    client: reqwest::Client,
    config: CollectorConfig,
}

impl CsvSource {
    pub fn new(client: reqwest::Client, config: CollectorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Ask the backend for a pre-signed download URL for `object_key`.
    pub async fn request_download_url(&self, object_key: &str) -> Result<String, FetchError> {
        let url = &self.config.api_base;
        info!(object_key, "Requesting pre-signed URL from backend");

        let resp = self
            .client
            .get(url)
            .query(&[("objectKey", object_key)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|source| FetchError::Network {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            error!(status = status.as_u16(), body = %body, "API error response");
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let presign: PresignResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::InvalidResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        presign
            .download_url
            .filter(|u| !u.is_empty())
            .ok_or(FetchError::MissingDownloadUrl)
    }

    /// Plain GET of a text body. Size and content hash are logged.
    pub async fn download(&self, url: &str, accept: Option<&str>) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let resp = request.send().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = format!("sha256:{:x}", hasher.finalize());

        info!(url, size_bytes = bytes.len(), hash = %content_hash, "Downloaded CSV");
        Ok(decode_csv_bytes(&bytes))
    }

    /// Resolve `object_key` through the backend and download the object.
    pub async fn fetch_object_text(&self, object_key: &str) -> Result<String, FetchError> {
        let download_url = self.request_download_url(object_key).await?;
        info!("Got pre-signed URL, downloading file");
        self.download(&download_url, None).await
    }

    /// Resolve `object_key` through the backend and parse the report rows.
    pub async fn fetch_csv_rows(&self, object_key: &str) -> Result<Vec<RawRow>, FetchError> {
        let text = self.fetch_object_text(object_key).await?;
        let parsed = parse_csv_rows(&text, &CsvOptions::report())?;
        info!(rows = parsed.rows.len(), "Parsed report rows");
        Ok(parsed.rows)
    }

    async fn fetch_normalized(&self, object_key: &str) -> Result<Vec<CanonicalRecord>, FetchError> {
        let rows = self.fetch_csv_rows(object_key).await?;
        Ok(normalize_rows(&rows))
    }

    /// Report records for `object_key`; never fails, falls back instead.
    pub async fn fetch_records(&self, object_key: &str) -> Vec<CanonicalRecord> {
        info!(object_key, "Attempting to fetch data from S3");
        match self.fetch_normalized(object_key).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to fetch from S3, using fallback data");
                fallback_records()
            }
        }
    }

    /// Same as [`CsvSource::fetch_records`], entered through the pre-signed URL path.
    pub async fn fetch_records_via_url(&self, object_key: &str) -> Vec<CanonicalRecord> {
        info!(object_key, "Attempting to fetch data via pre-signed URL");
        match self.fetch_normalized(object_key).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to fetch via URL, using fallback data");
                fallback_records()
            }
        }
    }

    /// Download the public validatielijst and keep the latest entry per bundle.
    pub async fn fetch_validatielijst(&self) -> Result<Vec<ValidatielijstRecord>, SourceError> {
        let url = &self.config.validatielijst_url;
        info!(url = %url, "Downloading validatielijst");

        let result = async {
            let text = self.download(url, Some("text/csv")).await?;
            let parsed = parse_csv_rows(&text, &CsvOptions::validatielijst())?;
            Ok::<_, FetchError>(parsed.rows)
        }
        .await;

        let rows = result.map_err(|e| {
            error!(error = %e, "Error fetching validatielijst data");
            SourceError::translate(e, VALIDATIELIJST, file_name(url))
        })?;

        let unique = merge_latest(extract_validatielijst(&rows));
        info!(rows = rows.len(), unique = unique.len(), "Reduced validatielijst");
        Ok(unique)
    }

    /// Validation report stored as `rapportages/<filename>`.
    pub async fn fetch_status_details(&self, filename: &str) -> Result<ValidationReport, SourceError> {
        let object_key = format!("rapportages/{}", filename);
        info!(object_key = %object_key, "Fetching status details");

        let result = async {
            let text = self.fetch_object_text(&object_key).await?;
            Ok::<_, FetchError>(ValidationReport::from_csv(&text)?)
        }
        .await;

        match result {
            Ok(report) => {
                info!(failures = report.failure_count(), "Parsed status details");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Error fetching status details");
                Err(SourceError::translate(e, STATUS_DETAILS, filename))
            }
        }
    }

    /// Hit the bare backend endpoint and report what came back.
    pub async fn test_api_connection(&self) -> Result<ApiProbe, FetchError> {
        let url = &self.config.api_base;
        info!(url = %url, "Testing API connection");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|source| FetchError::Network {
            url: url.clone(),
            source,
        })?;

        info!(status, "Test response received");
        Ok(ApiProbe { status, body })
    }
}

fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_single_illustrative_record() {
        let records = fallback_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].criterion, "ANSNL-D8C1");
        assert!(!records[0].validated);
        assert!(!records[0].approved);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("https://raw.githubusercontent.com/openearth/krmvalidatie/main/data/validatielijst.csv"),
            "validatielijst.csv"
        );
        assert_eq!(file_name("plain"), "plain");
    }
}
