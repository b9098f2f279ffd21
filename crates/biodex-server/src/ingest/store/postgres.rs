//! Postgres-backed dataset store

use async_trait::async_trait;
use biodex_common::{DatasetRecord, DatasetType};
use sqlx::PgPool;
use uuid::Uuid;

use super::{DatasetStore, UpsertOutcome};
use crate::ingest::error::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct DatasetRow {
    title: String,
    source: String,
    dataset_type: String,
    organism: Option<String>,
    assay_type: Option<String>,
    description: String,
}

impl TryFrom<DatasetRow> for DatasetRecord {
    type Error = StoreError;

    fn try_from(row: DatasetRow) -> Result<Self, Self::Error> {
        let dataset_type = row
            .dataset_type
            .parse::<DatasetType>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(DatasetRecord {
            source: row.source,
            dataset_type,
            title: row.title,
            organism: row.organism,
            assay_type: row.assay_type,
            description: row.description,
        })
    }
}

/// Dataset store over the `datasets` table
#[derive(Debug, Clone)]
pub struct PgDatasetStore {
    pool: PgPool,
}

impl PgDatasetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetStore for PgDatasetStore {
    async fn upsert(&self, record: &DatasetRecord) -> Result<UpsertOutcome, StoreError> {
        // xmax is 0 only for a row version created by a plain insert.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO datasets (id, title, source, dataset_type, organism, assay_type, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (title, source) DO UPDATE
            SET dataset_type = EXCLUDED.dataset_type,
                organism = EXCLUDED.organism,
                assay_type = EXCLUDED.assay_type,
                description = EXCLUDED.description,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.title)
        .bind(&record.source)
        .bind(record.dataset_type.as_str())
        .bind(&record.organism)
        .bind(&record.assay_type)
        .bind(&record.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(UpsertOutcome { inserted })
    }

    async fn get(&self, title: &str, source: &str) -> Result<Option<DatasetRecord>, StoreError> {
        sqlx::query_as::<_, DatasetRow>(
            r#"
            SELECT title, source, dataset_type, organism, assay_type, description
            FROM datasets
            WHERE title = $1 AND source = $2
            "#,
        )
        .bind(title)
        .bind(source)
        .fetch_optional(&self.pool)
        .await?
        .map(DatasetRecord::try_from)
        .transpose()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
