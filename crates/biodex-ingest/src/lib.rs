//! Biodex Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Client for the external dataset search provider (NASA OSDR).
//!
//! The [`provider`] module turns a set of [`SearchFilters`] into a provider
//! query, and normalizes the heterogeneous hits it returns into canonical
//! [`biodex_common::DatasetRecord`]s.
//!
//! # Example
//!
//! ```no_run
//! use biodex_ingest::{DatasetProvider, OsdrClient, ProviderConfig, SearchFilters};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OsdrClient::new(ProviderConfig::default())?;
//!     let filters = SearchFilters::new("microgravity").with_limit(5);
//!     for record in client.try_fetch(&filters).await? {
//!         tracing::info!(title = %record.title, r#type = %record.dataset_type, "fetched");
//!     }
//!     Ok(())
//! }
//! ```

pub mod provider;

pub use provider::{
    DatasetProvider, OsdrClient, ProviderConfig, ProviderError, SearchFilters,
    DEFAULT_SEARCH_TERM,
};
