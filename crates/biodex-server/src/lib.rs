//! Biodex Server Library
//!
//! Asynchronous ingestion of public space-biology dataset metadata.
//!
//! # Overview
//!
//! - **API**: admin routes to enqueue ingestion jobs and read their status
//! - **Queue**: durable Postgres job queue with exclusive claims and retry
//! - **Worker**: claims jobs, queries the provider, upserts datasets
//! - **Scheduler**: daily and weekly cron sweeps that enqueue jobs
//!
//! The API process (`biodex-server`) and the consumer process
//! (`biodex-worker`) share nothing but the database.
//!
//! # Example
//!
//! ```no_run
//! use biodex_server::ingest::{InMemoryJobQueue, JobQueue, NewJob, IngestJobPayload};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let queue = InMemoryJobQueue::new();
//! let job_id = queue
//!     .enqueue(NewJob::new(IngestJobPayload::new("microgravity", 5), "cli"))
//!     .await?;
//! println!("queued {job_id}");
//! # Ok(())
//! # }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod app;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
