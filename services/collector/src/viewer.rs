//! Viewer URL resolution for KRM criteria.
//!
//! A criterion string may hold several criteria separated by `;`. Each one is
//! searched in the layer catalogue, the best layer is picked by name, and all
//! picks are combined into one viewer link. Results are memoized in a
//! [`ViewerUrlCache`].

use crate::config::CollectorConfig;
use crate::error::FetchError;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

const PUBLISHED_VIEWER: &str = "IHM viewer";
const TEST_VIEWER: &str = "IHM_KRM_test";

const CRITERIUM_PREFIXES: &[&str] = &["ANSNL-", "ANSN-", "ANSL-"];

/// Strip one leading `ANSNL-`, `ANSN-` or `ANSL-` prefix.
pub fn clean_criterium(criterium: &str) -> &str {
    CRITERIUM_PREFIXES
        .iter()
        .find_map(|prefix| criterium.strip_prefix(*prefix))
        .unwrap_or(criterium)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicationStatus {
    Published,
    NotPublished,
}

impl PublicationStatus {
    /// Anything but `not_published` counts as published.
    pub fn parse(raw: &str) -> Self {
        if raw == "not_published" {
            PublicationStatus::NotPublished
        } else {
            PublicationStatus::Published
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PublicationStatus::Published => "published",
            PublicationStatus::NotPublished => "not_published",
        }
    }

    fn search_viewer(self) -> &'static str {
        match self {
            PublicationStatus::Published => PUBLISHED_VIEWER,
            PublicationStatus::NotPublished => TEST_VIEWER,
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LayerId {
    Text(String),
    Number(i64),
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerId::Text(s) => f.write_str(s),
            LayerId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One hit from the layer search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerLink {
    pub url: String,
    pub layer_names: Vec<String>,
    pub descriptions: Vec<Option<String>>,
}

/// Pick the layer to show for one criterion.
///
/// Test data must come from the `tst_actueel_indicator` layer. Published data
/// prefers an "actueel"/"current" layer and otherwise takes the first hit.
pub fn select_layer(layers: &[Layer], status: PublicationStatus) -> Option<&Layer> {
    match status {
        PublicationStatus::NotPublished => layers
            .iter()
            .find(|l| l.name.to_lowercase().contains("tst_actueel_indicator")),
        PublicationStatus::Published => layers
            .iter()
            .find(|l| {
                let name = l.name.to_lowercase();
                name.contains("actueel") || name.contains("current")
            })
            .or_else(|| layers.first()),
    }
}

fn encode_component(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `<base>?layers=<ids>&layerNames=<encoded names>`, both comma separated.
pub fn build_viewer_url(base: &str, layers: &[&Layer]) -> String {
    let ids: Vec<String> = layers.iter().map(|l| l.id.to_string()).collect();
    let names: Vec<String> = layers.iter().map(|l| encode_component(&l.name)).collect();
    format!("{}?layers={}&layerNames={}", base, ids.join(","), names.join(","))
}

/// Memoized viewer links keyed by `"<criterium>|<status>"`.
///
/// No eviction and no expiry. Only successful lookups are stored, so a
/// criterion that failed is retried on the next call.
#[derive(Debug, Default)]
pub struct ViewerUrlCache {
    entries: Mutex<HashMap<String, ViewerLink>>,
}

impl ViewerUrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(criterium: &str, status: PublicationStatus) -> String {
        format!("{}|{}", criterium, status)
    }

    pub fn get(&self, key: &str) -> Option<ViewerLink> {
        self.lock().get(key).cloned()
    }

    pub fn put(&self, key: String, link: ViewerLink) {
        self.lock().insert(key, link);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached value for `key`, or the result of `resolve` (stored when `Some`).
    ///
    /// The lock is not held while `resolve` runs.
    pub async fn get_or_resolve<F, Fut>(&self, key: &str, resolve: F) -> Option<ViewerLink>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<ViewerLink>>,
    {
        if let Some(hit) = self.get(key) {
            debug!(key, "Viewer URL cache hit");
            return Some(hit);
        }
        let resolved = resolve().await;
        if let Some(link) = &resolved {
            self.put(key.to_string(), link.clone());
        }
        resolved
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ViewerLink>> {
        // A poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Layer search client plus the cache in front of it.
#[derive(Debug)]
pub struct ViewerResolver {
    client: reqwest::Client,
    config: CollectorConfig,
    cache: ViewerUrlCache,
}

impl ViewerResolver {
    pub fn new(client: reqwest::Client, config: CollectorConfig) -> Self {
        Self::with_cache(client, config, ViewerUrlCache::new())
    }

    pub fn with_cache(client: reqwest::Client, config: CollectorConfig, cache: ViewerUrlCache) -> Self {
        Self {
            client,
            config,
            cache,
        }
    }

    pub fn cache(&self) -> &ViewerUrlCache {
        &self.cache
    }

    fn viewer_base(&self, status: PublicationStatus) -> &str {
        match status {
            PublicationStatus::Published => &self.config.viewer_published,
            PublicationStatus::NotPublished => &self.config.viewer_not_published,
        }
    }

    /// Query the layer catalogue for one criterion.
    pub async fn search_layers(
        &self,
        criterium: &str,
        status: PublicationStatus,
    ) -> Result<Vec<Layer>, FetchError> {
        let cleaned = clean_criterium(criterium);
        let url = &self.config.search_base;
        info!(cleaned, original = criterium, viewer = status.search_viewer(), "Searching layers");

        let resp = self
            .client
            .get(url)
            .query(&[("viewer", status.search_viewer()), ("query", cleaned)])
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

        let code = resp.status();
        if !code.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status: code.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let bytes = resp.bytes().await.map_err(|source| FetchError::Network {
            url: url.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::InvalidResponse {
            url: url.clone(),
            reason: e.to_string(),
        })
    }

    async fn layer_for(
        &self,
        criterium: &str,
        status: PublicationStatus,
    ) -> Result<Option<Layer>, FetchError> {
        let layers = self.search_layers(criterium, status).await?;
        if layers.is_empty() {
            warn!(criterium, cleaned = clean_criterium(criterium), "No results found for criterium");
            return Ok(None);
        }
        let selected = select_layer(&layers, status).cloned();
        debug!(criterium, layer = ?selected.as_ref().map(|l| &l.name), "Selected layer");
        Ok(selected)
    }

    /// Combined viewer link for a (possibly compound) criterion, uncached.
    ///
    /// All sub-criteria are searched concurrently; one failed search fails the
    /// whole lookup.
    pub async fn viewer_url_for_criterium(
        &self,
        criterium: &str,
        status: PublicationStatus,
    ) -> Option<ViewerLink> {
        let criteria: Vec<&str> = criterium
            .split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if criteria.is_empty() {
            warn!("No criteria provided");
            return None;
        }

        let lookups = criteria.iter().map(|c| self.layer_for(c, status));
        let selected = match try_join_all(lookups).await {
            Ok(selected) => selected,
            Err(e) => {
                error!(criterium, error = %e, "Error getting viewer URL for criterium");
                return None;
            }
        };

        let layers: Vec<&Layer> = selected.iter().flatten().collect();
        if layers.is_empty() {
            warn!(criterium, "No valid results found for any criterium");
            return None;
        }

        Some(ViewerLink {
            url: build_viewer_url(self.viewer_base(status), &layers),
            layer_names: layers.iter().map(|l| l.name.clone()).collect(),
            descriptions: layers.iter().map(|l| l.description.clone()).collect(),
        })
    }

    /// Cached variant of [`ViewerResolver::viewer_url_for_criterium`].
    pub async fn cached_viewer_url(
        &self,
        criterium: &str,
        status: PublicationStatus,
    ) -> Option<ViewerLink> {
        let key = ViewerUrlCache::key(criterium, status);
        self.cache
            .get_or_resolve(&key, move || self.viewer_url_for_criterium(criterium, status))
            .await
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Viewer URL cache cleared");
    }
}
