//! Biodex Worker - ingestion job consumer
//!
//! Runs the worker pool, the stale-claim sweeper and (unless disabled) the
//! cron scheduler against the shared Postgres queue. Any number of worker
//! processes may run side by side; claims are exclusive across them.

use anyhow::Result;
use biodex_common::logging::{init_logging, LogConfig};
use biodex_ingest::{DatasetProvider, OsdrClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use biodex_server::{
    app,
    config::Config,
    ingest::{
        default_schedule, DatasetStore, IngestConfig, IngestionWorker, JobQueue, JobScheduler,
        PgDatasetStore, PgJobQueue, WorkerConfig,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("biodex-worker")
        .filter_directives("biodex_server=debug,biodex_ingest=debug,sqlx=warn")
        .build()
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    info!("Starting Biodex Worker");

    let config = Config::load()?;
    let ingest_config = IngestConfig::from_env()?;
    info!(
        concurrency = ingest_config.worker_concurrency,
        provider = %ingest_config.provider_base_url,
        strict_provider_errors = ingest_config.strict_provider_errors,
        scheduler = ingest_config.scheduler_enabled,
        "Ingestion configuration loaded"
    );

    let db_pool = app::connect_database(&config.database).await?;
    app::run_migrations(&db_pool).await?;

    let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(db_pool.clone()));
    let store: Arc<dyn DatasetStore> = Arc::new(PgDatasetStore::new(db_pool));
    let provider: Arc<dyn DatasetProvider> =
        Arc::new(OsdrClient::new(ingest_config.provider_config())?);

    let worker = IngestionWorker::new(
        queue.clone(),
        store,
        provider,
        WorkerConfig::from(&ingest_config),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = worker.spawn_pool(ingest_config.worker_concurrency, shutdown_rx.clone());
    handles.push(worker.spawn_stale_sweeper(shutdown_rx.clone()));

    if ingest_config.scheduler_enabled {
        let scheduler = JobScheduler::new(queue, default_schedule()?)
            .with_max_attempts(ingest_config.max_attempts);
        handles.push(scheduler.start(shutdown_rx));
    } else {
        info!("Scheduler disabled (INGEST_SCHEDULER_ENABLED=false)");
    }

    info!(worker_id = %worker.worker_id(), "Worker running");
    app::shutdown_signal().await;

    let _ = shutdown_tx.send(true);

    // In-flight jobs finish on their own; the fetch timeout bounds how long that takes.
    let grace = Duration::from_secs(config.server.shutdown_timeout_secs)
        .max(WorkerConfig::from(&ingest_config).fetch_timeout);
    if tokio::time::timeout(grace, futures::future::join_all(handles))
        .await
        .is_err()
    {
        warn!(grace_secs = grace.as_secs(), "Worker tasks still running at shutdown deadline");
    }

    info!("Worker shut down");
    Ok(())
}
