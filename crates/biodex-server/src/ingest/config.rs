//! Ingestion configuration
//!
//! Worker pool, retry and scheduler settings (`INGEST_*` variables) plus the
//! provider connection settings (`PROVIDER_*`).

use biodex_ingest::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::jobs::RetryPolicy;
use crate::config::env_or;

pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_SECS: u64 = 30;
pub const DEFAULT_RETRY_MAX_BACKOFF_SECS: u64 = 3600;

/// Default age after which an `active` claim is considered abandoned (15 minutes).
pub const DEFAULT_STALE_AFTER_SECS: u64 = 900;

/// Slack added to the provider timeout for the worker's outer fetch bound,
/// so the HTTP client's own timeout fires first.
pub const FETCH_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Concurrent worker loops per process
    pub worker_concurrency: usize,
    /// Sleep between claims when the queue is empty
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub retry_base_secs: u64,
    pub retry_max_backoff_secs: u64,
    /// Fail jobs on provider errors instead of completing them empty
    pub strict_provider_errors: bool,
    pub stale_after_secs: u64,
    /// Run the cron scheduler in the worker process
    pub scheduler_enabled: bool,
    /// Run the cron scheduler in the API process too
    pub scheduler_in_server: bool,
    pub provider_base_url: String,
    pub provider_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let provider = ProviderConfig::default();
        Self {
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_secs: DEFAULT_RETRY_BASE_SECS,
            retry_max_backoff_secs: DEFAULT_RETRY_MAX_BACKOFF_SECS,
            strict_provider_errors: true,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            scheduler_enabled: true,
            scheduler_in_server: false,
            provider_base_url: provider.base_url,
            provider_timeout_secs: provider.timeout_secs,
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            worker_concurrency: env_or(
                "INGEST_WORKER_CONCURRENCY",
                defaults.worker_concurrency,
            )?,
            poll_interval_ms: env_or("INGEST_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            max_attempts: env_or("INGEST_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_base_secs: env_or("INGEST_RETRY_BASE_SECS", defaults.retry_base_secs)?,
            retry_max_backoff_secs: env_or(
                "INGEST_RETRY_MAX_BACKOFF_SECS",
                defaults.retry_max_backoff_secs,
            )?,
            strict_provider_errors: env_or(
                "INGEST_STRICT_PROVIDER_ERRORS",
                defaults.strict_provider_errors,
            )?,
            stale_after_secs: env_or("INGEST_STALE_AFTER_SECS", defaults.stale_after_secs)?,
            scheduler_enabled: env_or("INGEST_SCHEDULER_ENABLED", defaults.scheduler_enabled)?,
            scheduler_in_server: env_or(
                "INGEST_SCHEDULER_IN_SERVER",
                defaults.scheduler_in_server,
            )?,
            provider_base_url: std::env::var("PROVIDER_BASE_URL")
                .unwrap_or(defaults.provider_base_url),
            provider_timeout_secs: env_or(
                "PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_concurrency == 0 {
            anyhow::bail!("INGEST_WORKER_CONCURRENCY must be greater than 0");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("INGEST_POLL_INTERVAL_MS must be greater than 0");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("INGEST_MAX_ATTEMPTS must be at least 1");
        }
        if self.retry_base_secs > self.retry_max_backoff_secs {
            anyhow::bail!(
                "INGEST_RETRY_BASE_SECS ({}) cannot exceed INGEST_RETRY_MAX_BACKOFF_SECS ({})",
                self.retry_base_secs,
                self.retry_max_backoff_secs
            );
        }
        if self.provider_base_url.trim().is_empty() {
            anyhow::bail!("PROVIDER_BASE_URL cannot be empty");
        }
        if self.provider_timeout_secs == 0 {
            anyhow::bail!("PROVIDER_TIMEOUT_SECS must be greater than 0");
        }
        if self.stale_after() <= self.fetch_timeout() {
            anyhow::bail!(
                "INGEST_STALE_AFTER_SECS ({}) must exceed PROVIDER_TIMEOUT_SECS ({}) plus {}s",
                self.stale_after_secs,
                self.provider_timeout_secs,
                FETCH_TIMEOUT_MARGIN_SECS
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Outer bound on a provider fetch. Longer than the HTTP client timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.saturating_add(FETCH_TIMEOUT_MARGIN_SECS))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.retry_base_secs),
            max_delay: Duration::from_secs(self.retry_max_backoff_secs),
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.provider_base_url.clone(),
            timeout_secs: self.provider_timeout_secs,
            ..Default::default()
        }
    }
}
