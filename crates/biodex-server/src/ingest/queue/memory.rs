//! In-process job queue

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ClaimOutcome, JobQueue};
use crate::ingest::error::QueueError;
use crate::ingest::jobs::{IngestionJob, JobOutcome, JobResult, JobState, NewJob};

/// Error recorded when a claim expires with no attempts left.
pub(crate) const STALE_CLAIM_ERROR: &str = "worker claim expired";

/// Job queue held in memory
///
/// Every operation takes the same mutex, so claims are exclusive across
/// tasks of one process. Jobs do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<HashMap<Uuid, IngestionJob>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently in `state`.
    pub async fn count_in_state(&self, state: JobState) -> usize {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|job| job.state == state)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

fn activate(job: &mut IngestionJob, worker_id: &str, now: DateTime<Utc>) {
    job.state = JobState::Active;
    job.attempts += 1;
    job.worker_id = Some(worker_id.to_string());
    job.claimed_at = Some(now);
}

/// A finishing transition needs the job active and claimed by `worker_id`.
fn expect_claimed_by(job: &IngestionJob, worker_id: &str) -> Result<(), QueueError> {
    if job.worker_id.as_deref() != Some(worker_id) {
        return Err(QueueError::ClaimLost {
            id: job.id,
            worker_id: worker_id.to_string(),
        });
    }
    if job.state != JobState::Active {
        return Err(QueueError::InvalidTransition {
            id: job.id,
            state: job.state,
            expected: JobState::Active,
        });
    }
    Ok(())
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, new_job: NewJob) -> Result<Uuid, QueueError> {
        let now = Utc::now();
        let job = IngestionJob {
            id: Uuid::new_v4(),
            payload: new_job.payload,
            state: JobState::Waiting,
            result: None,
            source: new_job.source,
            attempts: 0,
            max_attempts: new_job.max_attempts.max(1),
            last_error: None,
            worker_id: None,
            run_at: now,
            created_at: now,
            claimed_at: None,
            finished_at: None,
        };
        let id = job.id;

        self.jobs.lock().await.insert(id, job);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<IngestionJob>, QueueError> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<IngestionJob>, QueueError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;

        let next = jobs
            .values_mut()
            .filter(|job| job.state == JobState::Waiting && job.run_at <= now)
            .min_by_key(|job| (job.run_at, job.created_at));

        Ok(next.map(|job| {
            activate(job, worker_id, now);
            job.clone()
        }))
    }

    async fn claim_by_id(&self, id: Uuid, worker_id: &str) -> Result<ClaimOutcome, QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;

        if job.state != JobState::Waiting {
            return Ok(ClaimOutcome::AlreadyClaimed(job.state));
        }

        activate(job, worker_id, Utc::now());
        Ok(ClaimOutcome::Claimed(job.clone()))
    }

    async fn complete(
        &self,
        id: Uuid,
        worker_id: &str,
        result: &JobResult,
    ) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        expect_claimed_by(job, worker_id)?;

        job.state = JobState::Completed;
        job.result = Some(JobOutcome::Success(*result));
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobState, QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        expect_claimed_by(job, worker_id)?;

        job.last_error = Some(error.to_string());
        match retry_at {
            Some(at) => {
                job.state = JobState::Waiting;
                job.run_at = at;
                job.worker_id = None;
                job.claimed_at = None;
            }
            None => {
                job.state = JobState::Failed;
                job.result = Some(JobOutcome::error(error));
                job.finished_at = Some(Utc::now());
            }
        }

        Ok(job.state)
    }

    async fn requeue_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(older_than)
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let mut jobs = self.jobs.lock().await;
        let mut moved = 0;

        for job in jobs.values_mut() {
            let expired = job.state == JobState::Active
                && job.claimed_at.is_some_and(|at| at + cutoff < now);
            if !expired {
                continue;
            }

            job.worker_id = None;
            job.claimed_at = None;
            if job.has_attempts_left() {
                job.state = JobState::Waiting;
                job.run_at = now;
            } else {
                job.state = JobState::Failed;
                job.last_error = Some(STALE_CLAIM_ERROR.to_string());
                job.result = Some(JobOutcome::error(STALE_CLAIM_ERROR));
                job.finished_at = Some(now);
            }
            moved += 1;
        }

        Ok(moved)
    }
}
