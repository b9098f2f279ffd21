//! Jobs feature module
//!
//! Admin routes to enqueue ingestion jobs and read their status. Every route
//! here sits behind the admin API key middleware.

use std::sync::Arc;

use crate::ingest::JobQueue;

pub mod commands;
pub mod queries;
pub mod routes;


pub use routes::admin_ingest_routes;

/// State shared by the job handlers
#[derive(Clone)]
pub struct JobsState {
    pub queue: Arc<dyn JobQueue>,
    /// Attempts granted to admin-enqueued jobs
    pub max_attempts: u32,
}

impl JobsState {
    pub fn new(queue: Arc<dyn JobQueue>, max_attempts: u32) -> Self {
        Self {
            queue,
            max_attempts,
        }
    }
}
