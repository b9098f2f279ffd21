//! Feature modules implementing the Biodex API
//!
//! Each feature is a vertical slice with its own `commands/` (writes),
//! `queries/` (reads) and `routes.rs`. Commands and queries implement the
//! `mediator` request marker so handlers stay plain async functions.
//!
//! - **jobs**: Admin ingestion enqueue and job status

pub mod jobs;

use axum::{middleware::from_fn_with_state, Router};

use crate::middleware::auth::{require_admin, AuthState};
use jobs::JobsState;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub jobs: JobsState,
    pub auth: AuthState,
}

/// Creates the API router with all feature routes mounted
///
/// - `/admin/ingest` - Ingestion job enqueue and status (admin key required)
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest(
        "/admin/ingest",
        jobs::admin_ingest_routes()
            .route_layer(from_fn_with_state(state.auth.clone(), require_admin))
            .with_state(state.jobs),
    )
}
