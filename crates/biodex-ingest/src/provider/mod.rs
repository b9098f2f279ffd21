//! Dataset provider client
//!
//! - **filters**: typed search parameters and their provider query encoding
//! - **normalize**: field-alias resolution, type classification, truncation
//! - **client**: the `reqwest`-based OSDR search client
//! - **error**: typed provider failures

pub mod client;
pub mod error;
pub mod filters;
pub mod normalize;

use async_trait::async_trait;
use biodex_common::DatasetRecord;
use tracing::warn;

pub use client::{OsdrClient, ProviderConfig};
pub use error::ProviderError;
pub use filters::{SearchFilters, DEFAULT_LIMIT, DEFAULT_SEARCH_TERM};

/// A source of dataset records.
///
/// Implementors provide [`try_fetch`](DatasetProvider::try_fetch). The lenient
/// [`fetch`](DatasetProvider::fetch) never fails: it logs the error and reports
/// an empty page, which callers cannot tell apart from a search with no hits.
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Fetch one page of records, surfacing transport and decoding failures.
    async fn try_fetch(&self, filters: &SearchFilters) -> Result<Vec<DatasetRecord>, ProviderError>;

    /// Fetch one page of records, mapping any failure to an empty list.
    async fn fetch(&self, filters: &SearchFilters) -> Vec<DatasetRecord> {
        match self.try_fetch(filters).await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    error = %e,
                    search_term = %filters.effective_term(),
                    "Provider fetch failed, treating as empty result"
                );
                Vec::new()
            }
        }
    }
}
