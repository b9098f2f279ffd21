//! Admin ingestion routes
//!
//! - `POST /api/v1/admin/ingest` - Enqueue an ingestion job
//! - `GET /api/v1/admin/ingest/:job_id` - Get a job's state and result

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    commands::{enqueue::handle as handle_enqueue, EnqueueIngestCommand, EnqueueIngestError},
    queries::{get_job::handle as handle_get_job, GetJobError, GetJobQuery},
    JobsState,
};
use crate::error::AppError;

/// Create admin ingestion routes
pub fn admin_ingest_routes() -> Router<JobsState> {
    Router::new()
        .route("/", post(enqueue_ingest))
        .route("/:job_id", get(get_job))
}

impl From<EnqueueIngestError> for AppError {
    fn from(err: EnqueueIngestError) -> Self {
        match err {
            EnqueueIngestError::Validation(message) => AppError::Validation(message),
            EnqueueIngestError::Queue(e) => AppError::Queue(e),
        }
    }
}

impl From<GetJobError> for AppError {
    fn from(err: GetJobError) -> Self {
        match err {
            GetJobError::NotFound => AppError::NotFound("Job not found".to_string()),
            GetJobError::Queue(e) => AppError::Queue(e),
        }
    }
}

/// Enqueue an ingestion job
///
/// POST /admin/ingest
///
/// - `202 Accepted` - `{"jobId": "<uuid>"}`
/// - `400 Bad Request` - Validation error or a body that is not the expected JSON
async fn enqueue_ingest(
    State(state): State<JobsState>,
    payload: Result<Json<EnqueueIngestCommand>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(command) =
        payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let response = handle_enqueue(state, command).await?;
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

/// Get a specific job by ID
///
/// GET /admin/ingest/:job_id
async fn get_job(
    State(state): State<JobsState>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let status = handle_get_job(state, GetJobQuery { job_id }).await?;
    Ok((StatusCode::OK, Json(status)).into_response())
}
