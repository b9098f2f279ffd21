//! Job definitions for dataset ingestion
//!
//! Defines the payload carried by each queued job, the job record the queue
//! keeps around it, and the result the worker reports back.

use biodex_common::BiodexError;
use biodex_ingest::{SearchFilters, DEFAULT_SEARCH_TERM};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Default number of records requested per job.
pub const DEFAULT_JOB_LIMIT: u32 = 10;

/// Upper bound accepted for `limit` at the HTTP boundary.
pub const MAX_JOB_LIMIT: u32 = 100;

/// Job source tag for admin-triggered jobs.
pub const SOURCE_ADMIN: &str = "admin";

/// Job source tag for CLI-triggered jobs.
pub const SOURCE_CLI: &str = "cli";

fn default_limit() -> u32 {
    DEFAULT_JOB_LIMIT
}

fn default_search_term() -> String {
    DEFAULT_SEARCH_TERM.to_string()
}

/// Parameters of one ingestion run
///
/// Stored as camelCase JSON. Absent optional fields are omitted rather than
/// written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJobPayload {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_search_term")]
    pub search_term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assay_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
}

impl Default for IngestJobPayload {
    fn default() -> Self {
        Self {
            limit: DEFAULT_JOB_LIMIT,
            search_term: default_search_term(),
            organism: None,
            assay_type: None,
            date_from: None,
            date_to: None,
            project_type: None,
        }
    }
}

impl IngestJobPayload {
    pub fn new(search_term: impl Into<String>, limit: u32) -> Self {
        Self {
            limit,
            search_term: search_term.into(),
            ..Default::default()
        }
    }

    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = Some(organism.into());
        self
    }

    /// Check the invariants a payload must hold before it is enqueued.
    pub fn validate(&self) -> Result<(), BiodexError> {
        if self.limit == 0 || self.limit > MAX_JOB_LIMIT {
            return Err(BiodexError::validation(format!(
                "limit must be between 1 and {MAX_JOB_LIMIT}, got {}",
                self.limit
            )));
        }

        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(BiodexError::validation(format!(
                    "dateFrom ({from}) must not be after dateTo ({to})"
                )));
            }
        }

        Ok(())
    }

    /// Provider filters for this payload.
    ///
    /// Dates are carried in the payload for auditing but the provider search
    /// has no date facet, so they are not forwarded.
    pub fn to_filters(&self) -> SearchFilters {
        SearchFilters {
            search_term: Some(self.search_term.clone()),
            limit: self.limit,
            organism: self.organism.clone(),
            assay_type: self.assay_type.clone(),
            project_type: self.project_type.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

/// Lifecycle state of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = BiodexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(BiodexError::InvalidJobState(other.to_string())),
        }
    }
}

/// Counters reported by a successful run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// The `limit` the job asked for
    pub requested: u32,
    /// Records returned by the provider
    pub processed: u32,
    /// Records that did not exist before this run
    pub inserted: u32,
    /// Records whose upsert failed
    #[serde(default)]
    pub failed: u32,
}

/// What a terminal job stores as its `result`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutcome {
    Success(JobResult),
    Error { error: String },
}

impl JobOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        JobOutcome::Error {
            error: message.into(),
        }
    }
}

/// A job as stored by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: Uuid,
    pub payload: IngestJobPayload,
    pub state: JobState,
    pub result: Option<JobOutcome>,
    pub source: String,
    /// Claims so far, including the current one while active
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub worker_id: Option<String>,
    /// Earliest time the job may be claimed
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestionJob {
    /// Whether another attempt is allowed after the current one fails.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Request to add a job to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub payload: IngestJobPayload,
    pub source: String,
    pub max_attempts: u32,
}

impl NewJob {
    pub fn new(payload: IngestJobPayload, source: impl Into<String>) -> Self {
        Self {
            payload,
            source: source.into(),
            max_attempts: RetryPolicy::default().max_attempts,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Exponential backoff between attempts of the same job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// When a job that just failed `attempt` should run again.
    pub fn next_run_at(&self, attempt: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = chrono::Duration::from_std(self.backoff(attempt))
            .unwrap_or_else(|_| chrono::Duration::seconds(self.max_delay.as_secs() as i64));
        now + delay
    }
}
