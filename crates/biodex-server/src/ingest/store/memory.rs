//! In-process dataset store

use async_trait::async_trait;
use biodex_common::DatasetRecord;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{DatasetStore, UpsertOutcome};
use crate::ingest::error::StoreError;

/// Dataset store held in a map keyed by `(title, source)`
#[derive(Debug, Default)]
pub struct InMemoryDatasetStore {
    records: RwLock<HashMap<(String, String), DatasetRecord>>,
}

impl InMemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, ordered by title.
    pub async fn records(&self) -> Vec<DatasetRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.title.cmp(&b.title));
        records
    }
}

#[async_trait]
impl DatasetStore for InMemoryDatasetStore {
    async fn upsert(&self, record: &DatasetRecord) -> Result<UpsertOutcome, StoreError> {
        let key = (record.title.clone(), record.source.clone());
        let previous = self.records.write().await.insert(key, record.clone());

        Ok(UpsertOutcome {
            inserted: previous.is_none(),
        })
    }

    async fn get(&self, title: &str, source: &str) -> Result<Option<DatasetRecord>, StoreError> {
        let key = (title.to_string(), source.to_string());
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().await.len() as u64)
    }
}
