//! OSDR search API client

use async_trait::async_trait;
use biodex_common::DatasetRecord;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::error::ProviderError;
use super::filters::{SearchFilters, DEFAULT_DATASET_CATEGORY};
use super::normalize::records_from_response;
use super::DatasetProvider;

// ============================================================================
// Provider Client Constants
// ============================================================================

/// Default OSDR search endpoint.
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://osdr.nasa.gov/osdr/data/search";

/// Default bound on a single search request, in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Provider connection settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub category: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            category: DEFAULT_DATASET_CATEGORY.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Load from `PROVIDER_BASE_URL` / `PROVIDER_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("PROVIDER_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            category: defaults.category,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP client for the OSDR dataset search
#[derive(Debug, Clone)]
pub struct OsdrClient {
    client: Client,
    config: ProviderConfig,
}

impl OsdrClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.base_url.trim().is_empty() {
            return Err(ProviderError::Config("base URL cannot be empty".to_string()));
        }
        if config.timeout_secs == 0 {
            return Err(ProviderError::Config("timeout must be greater than 0".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("biodex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl DatasetProvider for OsdrClient {
    async fn try_fetch(&self, filters: &SearchFilters) -> Result<Vec<DatasetRecord>, ProviderError> {
        let query = filters.query_pairs(&self.config.category);
        debug!(url = %self.config.base_url, ?query, "Querying dataset provider");

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        let records = records_from_response(&body, filters.limit as usize)?;

        info!(
            search_term = %filters.effective_term(),
            limit = filters.limit,
            returned = records.len(),
            "Provider search completed"
        );

        Ok(records)
    }
}
