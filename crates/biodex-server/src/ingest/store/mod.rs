//! Dataset persistence
//!
//! Records are keyed by `(title, source)`. An upsert of an existing key
//! overwrites every other field (last write wins).

use async_trait::async_trait;
use biodex_common::DatasetRecord;

use super::error::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDatasetStore;
pub use postgres::PgDatasetStore;

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// `true` when the key was new, `false` when an existing row was updated
    pub inserted: bool,
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Insert or update by natural key in one atomic step.
    async fn upsert(&self, record: &DatasetRecord) -> Result<UpsertOutcome, StoreError>;

    async fn get(&self, title: &str, source: &str) -> Result<Option<DatasetRecord>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}
