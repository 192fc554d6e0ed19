use std::time::Duration;

pub const DEFAULT_API_BASE: &str =
    "https://fe9dopz8y1.execute-api.eu-west-1.amazonaws.com/default/krm-dashboard-dev";
pub const DEFAULT_OBJECT_KEY: &str = "rapportages/akkoorddata.csv";
pub const DEFAULT_VALIDATIELIJST_URL: &str =
    "https://raw.githubusercontent.com/openearth/krmvalidatie/main/data/validatielijst.csv";
pub const DEFAULT_SEARCH_BASE: &str = "https://kaartenbak.netlify.app/api/search";
pub const DEFAULT_VIEWER_PUBLISHED: &str = "https://viewer.openearth.nl/ihm-viewer/";
pub const DEFAULT_VIEWER_NOT_PUBLISHED: &str = "https://viewer.openearth.nl/ihm-krm-test/";

/// Endpoints and client settings for every external origin.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Backend that hands out pre-signed download URLs
    pub api_base: String,
    pub default_object_key: String,
    pub validatielijst_url: String,
    pub search_base: String,
    pub viewer_published: String,
    pub viewer_not_published: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            default_object_key: DEFAULT_OBJECT_KEY.to_string(),
            validatielijst_url: DEFAULT_VALIDATIELIJST_URL.to_string(),
            search_base: DEFAULT_SEARCH_BASE.to_string(),
            viewer_published: DEFAULT_VIEWER_PUBLISHED.to_string(),
            viewer_not_published: DEFAULT_VIEWER_NOT_PUBLISHED.to_string(),
            timeout: Duration::from_secs(60),
            user_agent: "KRM-Dashboard/1.0".to_string(),
        }
    }
}

impl CollectorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: std::env::var("KRM_API_BASE").unwrap_or(defaults.api_base),
            default_object_key: std::env::var("KRM_OBJECT_KEY")
                .unwrap_or(defaults.default_object_key),
            validatielijst_url: std::env::var("KRM_VALIDATIELIJST_URL")
                .unwrap_or(defaults.validatielijst_url),
            search_base: std::env::var("KRM_SEARCH_BASE").unwrap_or(defaults.search_base),
            viewer_published: std::env::var("KRM_VIEWER_PUBLISHED")
                .unwrap_or(defaults.viewer_published),
            viewer_not_published: std::env::var("KRM_VIEWER_NOT_PUBLISHED")
                .unwrap_or(defaults.viewer_not_published),
            timeout: Duration::from_secs(
                std::env::var("KRM_HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
            ),
            user_agent: std::env::var("KRM_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Point every origin at one base URL. Used against local stand-ins.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_base: format!("{}/presign", base),
            validatielijst_url: format!("{}/validatielijst.csv", base),
            search_base: format!("{}/search", base),
            ..Self::default()
        }
    }

    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.default_object_key, "rapportages/akkoorddata.csv");
        assert_eq!(config.viewer_published, "https://viewer.openearth.nl/ihm-viewer/");
        assert_eq!(config.viewer_not_published, "https://viewer.openearth.nl/ihm-krm-test/");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_with_base() {
        let config = CollectorConfig::with_base("http://127.0.0.1:9000/");
        assert_eq!(config.api_base, "http://127.0.0.1:9000/presign");
        assert_eq!(config.validatielijst_url, "http://127.0.0.1:9000/validatielijst.csv");
        assert_eq!(config.search_base, "http://127.0.0.1:9000/search");
        // Viewer links still point at the real viewer
        assert_eq!(config.viewer_published, DEFAULT_VIEWER_PUBLISHED);
    }

    #[test]
    fn test_build_client() {
        assert!(CollectorConfig::default().build_client().is_ok());
    }
}
