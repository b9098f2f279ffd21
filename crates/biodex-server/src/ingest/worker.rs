//! Ingestion worker
//!
//! A worker claims jobs from the queue, fetches records from the provider and
//! upserts them one at a time. A record that fails to store is counted and
//! skipped; only a failed fetch fails the job.
//!
//! A fetch that runs out of time always fails the job, whether it is the
//! provider's own request timeout or the worker's outer bound that fires.
//! Other provider errors complete the job empty unless strict mode is on.

use biodex_ingest::{DatasetProvider, ProviderError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::config::IngestConfig;
use super::error::{QueueError, WorkerError};
use super::jobs::{IngestionJob, JobResult, JobState, RetryPolicy};
use super::queue::JobQueue;
use super::store::DatasetStore;

/// Runtime settings for a worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    pub strict_provider_errors: bool,
    pub stale_after: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for WorkerConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            fetch_timeout: config.fetch_timeout(),
            retry: config.retry_policy(),
            strict_provider_errors: config.strict_provider_errors,
            stale_after: config.stale_after(),
        }
    }
}

/// Worker for processing ingestion jobs
#[derive(Clone)]
pub struct IngestionWorker {
    worker_id: String,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn DatasetStore>,
    provider: Arc<dyn DatasetProvider>,
    config: WorkerConfig,
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

fn default_worker_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{host}-{}", &suffix[..8])
}

impl IngestionWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn DatasetStore>,
        provider: Arc<dyn DatasetProvider>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            worker_id: default_worker_id(),
            queue,
            store,
            provider,
            config,
        }
    }

    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run one job's ingestion and report its counters.
    ///
    /// Does not touch the job's queue state; see [`run_once`](Self::run_once).
    pub async fn process(&self, job: &IngestionJob) -> Result<JobResult, WorkerError> {
        let filters = job.payload.to_filters();
        let timeout_secs = self.config.fetch_timeout.as_secs();

        let fetch = async {
            match self.provider.try_fetch(&filters).await {
                Ok(records) => Ok(records),
                Err(ProviderError::Timeout) => Err(WorkerError::Provider(ProviderError::Timeout)),
                Err(e) if self.config.strict_provider_errors => Err(WorkerError::from(e)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        search_term = %filters.effective_term(),
                        "Provider fetch failed, completing with no records"
                    );
                    Ok(Vec::new())
                }
            }
        };

        let records = tokio::time::timeout(self.config.fetch_timeout, fetch)
            .await
            .map_err(|_| WorkerError::Timeout(timeout_secs))??;

        let mut result = JobResult {
            requested: job.payload.limit,
            processed: records.len() as u32,
            ..Default::default()
        };

        for record in &records {
            match self.store.upsert(record).await {
                Ok(outcome) if outcome.inserted => result.inserted += 1,
                Ok(_) => {}
                Err(e) => {
                    result.failed += 1;
                    tracing::warn!(title = %record.title, error = %e, "Failed to store dataset");
                }
            }
        }

        Ok(result)
    }

    /// Claim and run at most one job. Returns whether a job was claimed.
    pub async fn run_once(&self) -> Result<bool, QueueError> {
        let Some(job) = self.queue.claim_next(&self.worker_id).await? else {
            return Ok(false);
        };

        let span = tracing::info_span!(
            "ingest_job",
            job_id = %job.id,
            source = %job.source,
            attempt = job.attempts,
        );
        self.execute(job).instrument(span).await?;
        Ok(true)
    }

    /// Process a claimed job and record the outcome on the queue.
    pub async fn execute(&self, job: IngestionJob) -> Result<JobState, QueueError> {
        tracing::info!(search_term = %job.payload.search_term, limit = job.payload.limit, "Processing job");

        match self.process(&job).await {
            Ok(result) => {
                self.queue.complete(job.id, &self.worker_id, &result).await?;
                tracing::info!(
                    requested = result.requested,
                    processed = result.processed,
                    inserted = result.inserted,
                    failed = result.failed,
                    "Job completed"
                );
                Ok(JobState::Completed)
            }
            Err(e) => {
                let message = e.to_string();
                let retry_at = job
                    .has_attempts_left()
                    .then(|| self.config.retry.next_run_at(job.attempts, Utc::now()));

                let state = self
                    .queue
                    .fail(job.id, &self.worker_id, &message, retry_at)
                    .await?;
                match retry_at {
                    Some(at) => tracing::warn!(
                        error = %message,
                        max_attempts = job.max_attempts,
                        retry_at = %at,
                        "Job failed, will retry"
                    ),
                    None => tracing::error!(error = %message, "Job failed after max attempts"),
                }
                Ok(state)
            }
        }
    }

    /// Claim and run jobs until `shutdown` flips to `true`.
    ///
    /// A job already in progress is finished before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(worker_id = %self.worker_id, "Worker started");

        while !is_shutdown(&shutdown) {
            let idle = match self.run_once().await {
                Ok(claimed) => !claimed,
                Err(e @ QueueError::ClaimLost { .. }) => {
                    tracing::warn!(
                        worker_id = %self.worker_id,
                        error = %e,
                        "Claim expired before the job finished, result discarded"
                    );
                    false
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "Queue error");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Worker stopped");
    }

    /// Start `concurrency` worker loops sharing this worker's queue, store and provider.
    pub fn spawn_pool(
        &self,
        concurrency: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        (0..concurrency)
            .map(|slot| {
                let worker = self
                    .clone()
                    .with_worker_id(format!("{}-{slot}", self.worker_id));
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect()
    }

    /// Periodically return abandoned claims to the queue.
    pub fn spawn_stale_sweeper(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let stale_after = self.config.stale_after;
        let period = (stale_after / 4).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            while !is_shutdown(&shutdown) {
                tokio::select! {
                    _ = ticker.tick() => {
                        match queue.requeue_stale(stale_after).await {
                            Ok(0) => {}
                            Ok(n) => tracing::warn!(requeued = n, "Requeued stale job claims"),
                            Err(e) => tracing::error!(error = %e, "Stale claim sweep failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest::error::StoreError;
    use crate::ingest::jobs::{IngestJobPayload, JobOutcome, NewJob};
    use crate::ingest::queue::{ClaimOutcome, InMemoryJobQueue};
    use crate::ingest::store::{InMemoryDatasetStore, UpsertOutcome};
    use async_trait::async_trait;
    use biodex_common::{DatasetRecord, DatasetType, DATASET_SOURCE};
    use biodex_ingest::{ProviderError, SearchFilters};

    struct StaticProvider(Result<Vec<DatasetRecord>, ProviderError>);

    #[async_trait]
    impl DatasetProvider for StaticProvider {
        async fn try_fetch(
            &self,
            _filters: &SearchFilters,
        ) -> Result<Vec<DatasetRecord>, ProviderError> {
            self.0.clone()
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl DatasetProvider for SlowProvider {
        async fn try_fetch(
            &self,
            _filters: &SearchFilters,
        ) -> Result<Vec<DatasetRecord>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }
    }

    /// Rejects one title, stores the rest.
    struct RejectingStore {
        inner: InMemoryDatasetStore,
        reject: &'static str,
    }

    #[async_trait]
    impl DatasetStore for RejectingStore {
        async fn upsert(&self, record: &DatasetRecord) -> Result<UpsertOutcome, StoreError> {
            if record.title == self.reject {
                return Err(StoreError::Unavailable("constraint violation".to_string()));
            }
            self.inner.upsert(record).await
        }

        async fn get(&self, title: &str, source: &str) -> Result<Option<DatasetRecord>, StoreError> {
            self.inner.get(title, source).await
        }

        async fn count(&self) -> Result<u64, StoreError> {
            self.inner.count().await
        }
    }

    fn record(title: &str) -> DatasetRecord {
        DatasetRecord {
            source: DATASET_SOURCE.to_string(),
            dataset_type: DatasetType::Genomics,
            title: title.to_string(),
            organism: None,
            assay_type: None,
            description: String::new(),
        }
    }

    fn worker_with(
        queue: Arc<InMemoryJobQueue>,
        store: Arc<dyn DatasetStore>,
        provider: Arc<dyn DatasetProvider>,
        config: WorkerConfig,
    ) -> IngestionWorker {
        IngestionWorker::new(queue, store, provider, config).with_worker_id("test-worker")
    }

    async fn claimed_job(queue: &InMemoryJobQueue, max_attempts: u32) -> IngestionJob {
        queue
            .enqueue(
                NewJob::new(IngestJobPayload::new("space biology", 3), "admin")
                    .with_max_attempts(max_attempts),
            )
            .await
            .unwrap();
        queue.claim_next("test-worker").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_process_counts_inserts() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let store = Arc::new(InMemoryDatasetStore::new());
        store.upsert(&record("existing")).await.unwrap();

        let provider = StaticProvider(Ok(vec![record("existing"), record("new one")]));
        let worker = worker_with(queue.clone(), store.clone(), Arc::new(provider), WorkerConfig::default());

        let job = claimed_job(&queue, 3).await;
        let result = worker.process(&job).await.unwrap();

        assert_eq!(
            result,
            JobResult {
                requested: 3,
                processed: 2,
                inserted: 1,
                failed: 0
            }
        );
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let store = Arc::new(RejectingStore {
            inner: InMemoryDatasetStore::new(),
            reject: "bad",
        });
        let provider = StaticProvider(Ok(vec![record("a"), record("bad"), record("c")]));
        let worker = worker_with(queue.clone(), store.clone(), Arc::new(provider), WorkerConfig::default());

        let job = claimed_job(&queue, 3).await;
        let result = worker.process(&job).await.unwrap();

        assert_eq!(result.processed, 3);
        assert_eq!(result.inserted, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_strict_provider_error_fails_process() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let provider = StaticProvider(Err(ProviderError::Status(503)));
        let worker = worker_with(
            queue.clone(),
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(provider),
            WorkerConfig::default(),
        );

        let job = claimed_job(&queue, 3).await;
        assert!(matches!(
            worker.process(&job).await,
            Err(WorkerError::Provider(ProviderError::Status(503)))
        ));
    }

    #[tokio::test]
    async fn test_lenient_provider_error_completes_empty() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let provider = StaticProvider(Err(ProviderError::Status(503)));
        let config = WorkerConfig {
            strict_provider_errors: false,
            ..Default::default()
        };
        let worker = worker_with(
            queue.clone(),
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(provider),
            config,
        );

        let job = claimed_job(&queue, 3).await;
        let state = worker.execute(job.clone()).await.unwrap();
        assert_eq!(state, JobState::Completed);

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(
            stored.result,
            Some(JobOutcome::Success(JobResult {
                requested: 3,
                processed: 0,
                inserted: 0,
                failed: 0
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_fails_process() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let config = WorkerConfig {
            fetch_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let worker = worker_with(
            queue.clone(),
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(SlowProvider),
            config,
        );

        let job = claimed_job(&queue, 3).await;
        assert!(matches!(worker.process(&job).await, Err(WorkerError::Timeout(5))));
    }

    #[tokio::test]
    async fn test_lenient_mode_still_fails_on_provider_timeout() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let config = WorkerConfig {
            strict_provider_errors: false,
            ..Default::default()
        };
        let worker = worker_with(
            queue.clone(),
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(StaticProvider(Err(ProviderError::Timeout))),
            config,
        );

        let job = claimed_job(&queue, 1).await;
        assert!(matches!(
            worker.process(&job).await,
            Err(WorkerError::Provider(ProviderError::Timeout))
        ));
        assert_eq!(worker.execute(job.clone()).await.unwrap(), JobState::Failed);

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert!(matches!(stored.result, Some(JobOutcome::Error { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lenient_mode_fails_on_outer_timeout() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let config = WorkerConfig {
            fetch_timeout: Duration::from_secs(5),
            strict_provider_errors: false,
            ..Default::default()
        };
        let worker = worker_with(
            queue.clone(),
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(SlowProvider),
            config,
        );

        let job = claimed_job(&queue, 3).await;
        assert!(matches!(worker.process(&job).await, Err(WorkerError::Timeout(5))));
    }

    #[tokio::test]
    async fn test_execute_after_claim_expired_reports_claim_lost() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let worker = worker_with(
            queue.clone(),
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(StaticProvider(Ok(vec![record("late")]))),
            WorkerConfig::default(),
        );

        let job = claimed_job(&queue, 3).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        queue.requeue_stale(Duration::ZERO).await.unwrap();
        let ClaimOutcome::Claimed(_) = queue.claim_by_id(job.id, "other-worker").await.unwrap()
        else {
            panic!("requeued job should be claimable");
        };

        assert!(matches!(
            worker.execute(job.clone()).await,
            Err(QueueError::ClaimLost { .. })
        ));

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Active);
        assert_eq!(stored.worker_id.as_deref(), Some("other-worker"));
        assert!(stored.result.is_none());
    }

    #[tokio::test]
    async fn test_failure_with_attempts_left_is_rescheduled() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let provider = StaticProvider(Err(ProviderError::Timeout));
        let worker = worker_with(
            queue.clone(),
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(provider),
            WorkerConfig::default(),
        );

        let job = claimed_job(&queue, 2).await;
        let before = Utc::now();
        assert_eq!(worker.execute(job.clone()).await.unwrap(), JobState::Waiting);

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert!(stored.run_at >= before + chrono::Duration::seconds(30));
        assert!(stored.result.is_none());

        // Second attempt exhausts max_attempts.
        let ClaimOutcome::Claimed(retry) = queue.claim_by_id(job.id, "test-worker").await.unwrap()
        else {
            panic!("retry should be claimable by id");
        };
        assert_eq!(retry.attempts, 2);
        assert_eq!(worker.execute(retry).await.unwrap(), JobState::Failed);

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(
            stored.result,
            Some(JobOutcome::error("Provider error: Provider request timed out"))
        );
    }

    #[tokio::test]
    async fn test_run_once_on_empty_queue() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let worker = worker_with(
            queue,
            Arc::new(InMemoryDatasetStore::new()),
            Arc::new(StaticProvider(Ok(vec![]))),
            WorkerConfig::default(),
        );

        assert!(!worker.run_once().await.unwrap());
    }
}
