//! Biodex Server - admin API entry point

use anyhow::Result;
use biodex_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tracing::info;

use biodex_server::{
    app::{self, AppState},
    config::Config,
    features::{jobs::JobsState, FeatureState},
    ingest::{default_schedule, IngestConfig, JobQueue, JobScheduler, PgJobQueue},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("biodex-server")
        .filter_directives("biodex_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    info!("Starting Biodex Server");

    let config = Config::load()?;
    let ingest_config = IngestConfig::from_env()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        admin_keys = config.auth.api_keys.len(),
        "Configuration loaded"
    );

    let db_pool = app::connect_database(&config.database).await?;
    app::run_migrations(&db_pool).await?;

    let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(db_pool.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if ingest_config.scheduler_in_server {
        let scheduler = JobScheduler::new(queue.clone(), default_schedule()?)
            .with_max_attempts(ingest_config.max_attempts);
        info!("Starting embedded ingestion scheduler");
        Some(scheduler.start(shutdown_rx))
    } else {
        None
    };

    let state = AppState {
        db: db_pool,
        features: FeatureState {
            jobs: JobsState::new(queue, ingest_config.max_attempts),
            auth: AuthState::new(&config.auth.api_keys),
        },
    };
    let router = app::create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(app::shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        let grace = std::time::Duration::from_secs(config.server.shutdown_timeout_secs);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Scheduler did not stop within the shutdown timeout");
        }
    }

    info!("Server shut down gracefully");
    Ok(())
}
