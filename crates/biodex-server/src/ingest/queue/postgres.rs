//! Postgres-backed job queue
//!
//! Jobs live in the `ingestion_jobs` table. A claim is one `UPDATE` whose
//! target row is picked with `FOR UPDATE SKIP LOCKED`, so concurrent workers
//! in any number of processes never receive the same job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::memory::STALE_CLAIM_ERROR;
use super::{ClaimOutcome, JobQueue};
use crate::ingest::error::QueueError;
use crate::ingest::jobs::{IngestionJob, JobOutcome, JobResult, JobState, NewJob};

const JOB_COLUMNS: &str = "id, payload, state, result, source, attempts, max_attempts, \
     last_error, worker_id, run_at, created_at, claimed_at, finished_at";

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    payload: Value,
    state: String,
    result: Option<Value>,
    source: String,
    attempts: i32,
    max_attempts: i32,
    last_error: Option<String>,
    worker_id: Option<String>,
    run_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for IngestionJob {
    type Error = QueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<JobState>()
            .map_err(|e| QueueError::Corrupt(e.to_string()))?;
        let result = row
            .result
            .map(serde_json::from_value::<JobOutcome>)
            .transpose()?;

        Ok(IngestionJob {
            id: row.id,
            payload: serde_json::from_value(row.payload)?,
            state,
            result,
            source: row.source,
            attempts: u32::try_from(row.attempts).unwrap_or_default(),
            max_attempts: u32::try_from(row.max_attempts).unwrap_or_default(),
            last_error: row.last_error,
            worker_id: row.worker_id,
            run_at: row.run_at,
            created_at: row.created_at,
            claimed_at: row.claimed_at,
            finished_at: row.finished_at,
        })
    }
}

/// Job queue stored in Postgres
#[derive(Debug, Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_state(&self, id: Uuid) -> Result<Option<JobState>, QueueError> {
        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM ingestion_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        state
            .map(|s| s.parse::<JobState>().map_err(|e| QueueError::Corrupt(e.to_string())))
            .transpose()
    }

    /// Explain why a finishing update for `worker_id` touched no row.
    async fn transition_error(&self, id: Uuid, worker_id: &str) -> QueueError {
        let row: Result<Option<(String, Option<String>)>, sqlx::Error> =
            sqlx::query_as("SELECT state, worker_id FROM ingestion_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match row {
            Ok(Some((_, holder))) if holder.as_deref() != Some(worker_id) => {
                QueueError::ClaimLost {
                    id,
                    worker_id: worker_id.to_string(),
                }
            }
            Ok(Some((state, _))) => match state.parse::<JobState>() {
                Ok(state) => QueueError::InvalidTransition {
                    id,
                    state,
                    expected: JobState::Active,
                },
                Err(e) => QueueError::Corrupt(e.to_string()),
            },
            Ok(None) => QueueError::NotFound(id),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    #[tracing::instrument(skip(self, job), fields(source = %job.source))]
    async fn enqueue(&self, job: NewJob) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        let payload = serde_json::to_value(&job.payload)?;
        let max_attempts = i32::try_from(job.max_attempts.max(1)).unwrap_or(i32::MAX);

        sqlx::query(
            r#"
            INSERT INTO ingestion_jobs (id, payload, state, source, max_attempts, run_at, created_at)
            VALUES ($1, $2, 'waiting', $3, $4, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(payload)
        .bind(&job.source)
        .bind(max_attempts)
        .execute(&self.pool)
        .await?;

        tracing::debug!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<IngestionJob>, QueueError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(IngestionJob::try_from)
            .transpose()
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<IngestionJob>, QueueError> {
        let sql = format!(
            r#"
            UPDATE ingestion_jobs
            SET state = 'active',
                attempts = attempts + 1,
                worker_id = $1,
                claimed_at = NOW()
            WHERE id = (
                SELECT id FROM ingestion_jobs
                WHERE state = 'waiting' AND run_at <= NOW()
                ORDER BY run_at, created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        );

        sqlx::query_as::<_, JobRow>(&sql)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?
            .map(IngestionJob::try_from)
            .transpose()
    }

    async fn claim_by_id(&self, id: Uuid, worker_id: &str) -> Result<ClaimOutcome, QueueError> {
        // A concurrent claimer blocks on the row lock, then re-checks
        // `state = 'waiting'` against the committed row and matches nothing.
        let sql = format!(
            r#"
            UPDATE ingestion_jobs
            SET state = 'active',
                attempts = attempts + 1,
                worker_id = $2,
                claimed_at = NOW()
            WHERE id = $1 AND state = 'waiting'
            RETURNING {JOB_COLUMNS}
            "#
        );

        let claimed = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?;

        match claimed {
            Some(row) => Ok(ClaimOutcome::Claimed(row.try_into()?)),
            None => match self.current_state(id).await? {
                Some(state) => Ok(ClaimOutcome::AlreadyClaimed(state)),
                None => Err(QueueError::NotFound(id)),
            },
        }
    }

    async fn complete(
        &self,
        id: Uuid,
        worker_id: &str,
        result: &JobResult,
    ) -> Result<(), QueueError> {
        let outcome = serde_json::to_value(JobOutcome::Success(*result))?;

        let updated = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET state = 'completed', result = $2, finished_at = NOW()
            WHERE id = $1 AND state = 'active' AND worker_id = $3
            "#,
        )
        .bind(id)
        .bind(outcome)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, worker_id).await);
        }
        Ok(())
    }

    async fn fail(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobState, QueueError> {
        let updated = match retry_at {
            Some(at) => {
                sqlx::query(
                    r#"
                    UPDATE ingestion_jobs
                    SET state = 'waiting', run_at = $3, last_error = $2,
                        worker_id = NULL, claimed_at = NULL
                    WHERE id = $1 AND state = 'active' AND worker_id = $4
                    "#,
                )
                .bind(id)
                .bind(error)
                .bind(at)
                .bind(worker_id)
                .execute(&self.pool)
                .await?
            }
            None => {
                let outcome = serde_json::to_value(JobOutcome::error(error))?;
                sqlx::query(
                    r#"
                    UPDATE ingestion_jobs
                    SET state = 'failed', result = $3, last_error = $2, finished_at = NOW()
                    WHERE id = $1 AND state = 'active' AND worker_id = $4
                    "#,
                )
                .bind(id)
                .bind(error)
                .bind(outcome)
                .bind(worker_id)
                .execute(&self.pool)
                .await?
            }
        };

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, worker_id).await);
        }

        Ok(if retry_at.is_some() {
            JobState::Waiting
        } else {
            JobState::Failed
        })
    }

    async fn requeue_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let exhausted = serde_json::to_value(JobOutcome::error(STALE_CLAIM_ERROR))?;

        let updated = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET state = CASE WHEN attempts < max_attempts THEN 'waiting' ELSE 'failed' END,
                run_at = CASE WHEN attempts < max_attempts THEN NOW() ELSE run_at END,
                result = CASE WHEN attempts < max_attempts THEN NULL ELSE $2 END,
                last_error = CASE WHEN attempts < max_attempts THEN last_error ELSE $3 END,
                finished_at = CASE WHEN attempts < max_attempts THEN NULL ELSE NOW() END,
                worker_id = NULL,
                claimed_at = NULL
            WHERE state = 'active' AND claimed_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(exhausted)
        .bind(STALE_CLAIM_ERROR)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected())
    }
}
