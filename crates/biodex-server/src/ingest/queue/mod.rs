//! Durable job queue
//!
//! The queue owns every job state transition:
//!
//! ```text
//! waiting --claim--> active --complete--> completed
//!    ^                  |
//!    +---fail(retry)----+--fail--> failed
//! ```
//!
//! A claim is exclusive: a waiting job moves to `active` for exactly one
//! caller. Both backends give that guarantee; Postgres with
//! `FOR UPDATE SKIP LOCKED`, the in-memory queue under a mutex.
//!
//! `complete` and `fail` only apply for the worker that still holds the
//! claim. Once a stale claim is requeued, the old holder gets
//! [`QueueError::ClaimLost`] instead of overwriting the new run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::error::QueueError;
use super::jobs::{IngestionJob, JobResult, JobState, NewJob};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryJobQueue;
pub use postgres::PgJobQueue;

/// Result of a targeted claim
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(IngestionJob),
    /// Someone else moved the job out of `waiting` first
    AlreadyClaimed(JobState),
}

/// Backend-neutral queue operations
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a new `waiting` job, runnable immediately.
    async fn enqueue(&self, job: NewJob) -> Result<Uuid, QueueError>;

    async fn get(&self, id: Uuid) -> Result<Option<IngestionJob>, QueueError>;

    /// Claim the oldest due `waiting` job, if any.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<IngestionJob>, QueueError>;

    /// Claim one specific job. Ignores `run_at`.
    async fn claim_by_id(&self, id: Uuid, worker_id: &str) -> Result<ClaimOutcome, QueueError>;

    /// Record a successful run of an `active` job held by `worker_id`.
    async fn complete(
        &self,
        id: Uuid,
        worker_id: &str,
        result: &JobResult,
    ) -> Result<(), QueueError>;

    /// Record a failed run of an `active` job held by `worker_id`.
    ///
    /// With `retry_at` the job goes back to `waiting` and becomes claimable
    /// at that instant; without it the job is terminally `failed`. Returns
    /// the resulting state.
    async fn fail(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobState, QueueError>;

    /// Return `active` jobs claimed longer than `older_than` ago to `waiting`.
    async fn requeue_stale(&self, older_than: Duration) -> Result<u64, QueueError>;
}
