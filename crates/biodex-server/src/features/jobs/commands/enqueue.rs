//! Enqueue ingestion command
//!
//! Validates an admin request at the HTTP boundary, turns it into a typed
//! [`IngestJobPayload`] and puts it on the queue.

use chrono::NaiveDate;
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::jobs::JobsState;
use crate::ingest::jobs::{
    IngestJobPayload, NewJob, DEFAULT_JOB_LIMIT, MAX_JOB_LIMIT, SOURCE_ADMIN,
};
use crate::ingest::QueueError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Command to enqueue one ingestion job
///
/// Every field is optional. Strings are trimmed and blank strings are
/// treated as absent.
///
/// ```json
/// { "limit": 5, "searchTerm": "microgravity", "organism": "Mus musculus" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueIngestCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assay_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
}

/// Response from enqueueing a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueIngestResponse {
    pub job_id: Uuid,
}

/// Errors that can occur when enqueueing a job
#[derive(Debug, thiserror::Error)]
pub enum EnqueueIngestError {
    #[error("{0}")]
    Validation(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl Request<Result<EnqueueIngestResponse, EnqueueIngestError>> for EnqueueIngestCommand {}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_date(field: &str, value: &Option<String>) -> Result<Option<NaiveDate>, EnqueueIngestError> {
    clean(value)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|_| {
                EnqueueIngestError::Validation(format!("{field} must be a YYYY-MM-DD date, got '{raw}'"))
            })
        })
        .transpose()
}

impl EnqueueIngestCommand {
    /// Validate the request and build the job payload.
    ///
    /// # Errors
    ///
    /// - `limit` outside 1..=100
    /// - `dateFrom` / `dateTo` not `YYYY-MM-DD`
    /// - `dateFrom` after `dateTo`
    pub fn validate(&self) -> Result<IngestJobPayload, EnqueueIngestError> {
        let limit = match self.limit {
            None => DEFAULT_JOB_LIMIT,
            Some(n) if (1..=i64::from(MAX_JOB_LIMIT)).contains(&n) => n as u32,
            Some(n) => {
                return Err(EnqueueIngestError::Validation(format!(
                    "limit must be between 1 and {MAX_JOB_LIMIT}, got {n}"
                )))
            }
        };

        let defaults = IngestJobPayload::default();
        let payload = IngestJobPayload {
            limit,
            search_term: clean(&self.search_term).unwrap_or(defaults.search_term),
            organism: clean(&self.organism),
            assay_type: clean(&self.assay_type),
            date_from: parse_date("dateFrom", &self.date_from)?,
            date_to: parse_date("dateTo", &self.date_to)?,
            project_type: clean(&self.project_type),
        };

        payload
            .validate()
            .map_err(|e| EnqueueIngestError::Validation(e.to_string()))?;

        Ok(payload)
    }
}

#[tracing::instrument(skip(state, command))]
pub async fn handle(
    state: JobsState,
    command: EnqueueIngestCommand,
) -> Result<EnqueueIngestResponse, EnqueueIngestError> {
    let payload = command.validate()?;
    let search_term = payload.search_term.clone();

    let job = NewJob::new(payload, SOURCE_ADMIN).with_max_attempts(state.max_attempts);
    let job_id = state.queue.enqueue(job).await?;

    tracing::info!(%job_id, %search_term, "Admin ingestion job enqueued");
    Ok(EnqueueIngestResponse { job_id })
}
