//! Error types for the ingestion pipeline

use biodex_ingest::ProviderError;
use thiserror::Error;
use uuid::Uuid;

use super::jobs::JobState;

/// Errors raised by a [`JobQueue`](super::queue::JobQueue) backend
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {id} is {state}, expected {expected}")]
    InvalidTransition {
        id: Uuid,
        state: JobState,
        expected: JobState,
    },

    /// The claim expired and the job was requeued or taken by another worker
    #[error("Job {id} is no longer claimed by {worker_id}")]
    ClaimLost { id: Uuid, worker_id: String },

    #[error("Corrupt job row: {0}")]
    Corrupt(String),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a [`DatasetStore`](super::store::DatasetStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt dataset row: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a job run fails as a whole
///
/// Per-record store failures are counted in the result instead.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider fetch timed out after {0}s")]
    Timeout(u64),
}
