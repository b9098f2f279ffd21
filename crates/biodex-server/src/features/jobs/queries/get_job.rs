//! Get job query
//!
//! Query to get a single job's state and result by ID.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::jobs::JobsState;
use crate::ingest::{IngestionJob, JobOutcome, JobState, QueueError};

/// Query to get a job by ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJobQuery {
    pub job_id: String,
}

/// Job status as returned to admins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: Uuid,
    pub state: JobState,
    /// Present once the job is completed or failed
    pub result: Option<JobOutcome>,
    pub source: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<IngestionJob> for JobStatus {
    fn from(job: IngestionJob) -> Self {
        Self {
            id: job.id,
            state: job.state,
            result: job.result,
            source: job.source,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            created_at: job.created_at,
            finished_at: job.finished_at,
        }
    }
}

/// Error type for get job query
#[derive(Debug, thiserror::Error)]
pub enum GetJobError {
    #[error("Job not found")]
    NotFound,
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl Request<Result<JobStatus, GetJobError>> for GetJobQuery {}

pub async fn handle(state: JobsState, query: GetJobQuery) -> Result<JobStatus, GetJobError> {
    // A malformed id cannot name a job; report it the same way as an unknown one.
    let id = Uuid::parse_str(query.job_id.trim()).map_err(|_| GetJobError::NotFound)?;

    let job = state.queue.get(id).await?.ok_or(GetJobError::NotFound)?;
    Ok(job.into())
}
