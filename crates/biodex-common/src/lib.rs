//! Biodex Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling, and logging for the Biodex workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`BiodexError`] for parse and validation failures
//! - **Logging**: centralized `tracing` initialization driven by `LOG_*` variables
//! - **Types**: the canonical [`types::DatasetRecord`] shared by the provider
//!   client and the dataset store
//!
//! # Example
//!
//! ```no_run
//! use biodex_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::BiodexError;
pub use types::{DatasetRecord, DatasetType, DATASET_SOURCE};
