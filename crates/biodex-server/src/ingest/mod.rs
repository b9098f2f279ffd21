//! Dataset ingestion infrastructure
//!
//! # Architecture
//!
//! - **config**: Worker, retry and scheduler settings (`INGEST_*` environment variables)
//! - **jobs**: Job payload, state, result and retry policy
//! - **queue**: Durable job queue (Postgres, in-memory)
//! - **store**: Dataset upsert by `(title, source)` (Postgres, in-memory)
//! - **worker**: Claims jobs, fetches from the provider, stores records
//! - **scheduler**: Cron triggers that enqueue the recurring sweeps
//!
//! Jobs are enqueued through the admin routes in `features::jobs` or by the
//! scheduler, and consumed by the `biodex-worker` binary.

pub mod config;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use config::IngestConfig;
pub use error::{QueueError, StoreError, WorkerError};
pub use jobs::{IngestJobPayload, IngestionJob, JobOutcome, JobResult, JobState, NewJob, RetryPolicy};
pub use queue::{ClaimOutcome, InMemoryJobQueue, JobQueue, PgJobQueue};
pub use scheduler::{default_schedule, FireReport, JobScheduler, ScheduleEntry};
pub use store::{DatasetStore, InMemoryDatasetStore, PgDatasetStore, UpsertOutcome};
pub use worker::{IngestionWorker, WorkerConfig};
