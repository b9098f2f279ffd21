//! Cron scheduler for recurring ingestion
//!
//! Each [`ScheduleEntry`] pairs a cron expression with the payloads to
//! enqueue when it fires. Firing only enqueues; it never waits for the jobs
//! and does not skip payloads that are already queued.

use biodex_ingest::DEFAULT_SEARCH_TERM;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::jobs::{IngestJobPayload, NewJob, DEFAULT_JOB_LIMIT};
use super::queue::JobQueue;

/// 02:00 UTC every day.
pub const DAILY_CRON: &str = "0 0 2 * * *";

/// 03:00 UTC every Sunday.
pub const WEEKLY_CRON: &str = "0 0 3 * * Sun";

pub const DAILY_SEARCH_TERMS: &[&str] = &[
    "space biology",
    "microgravity",
    "spaceflight",
    "radiation",
    "bone loss",
];
pub const DAILY_LIMIT: u32 = 5;

pub const WEEKLY_ORGANISMS: &[&str] = &[
    "Mus musculus",
    "Homo sapiens",
    "Arabidopsis thaliana",
    "Drosophila melanogaster",
    "Caenorhabditis elegans",
];
pub const WEEKLY_LIMIT: u32 = DEFAULT_JOB_LIMIT;

/// A named cron trigger and the jobs it enqueues
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub name: String,
    pub schedule: Schedule,
    pub payloads: Vec<IngestJobPayload>,
}

impl ScheduleEntry {
    /// Build an entry from a 6-field cron expression (`sec min hour dom month dow`).
    pub fn new(
        name: impl Into<String>,
        cron: &str,
        payloads: Vec<IngestJobPayload>,
    ) -> Result<Self, cron::error::Error> {
        Ok(Self {
            name: name.into(),
            schedule: Schedule::from_str(cron)?,
            payloads,
        })
    }

    /// Job source tag, e.g. `scheduled:daily`.
    pub fn source(&self) -> String {
        format!("scheduled:{}", self.name)
    }

    /// First fire time strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// The built-in daily keyword sweep and weekly organism sweep.
pub fn default_schedule() -> Result<Vec<ScheduleEntry>, cron::error::Error> {
    let daily = DAILY_SEARCH_TERMS
        .iter()
        .map(|term| IngestJobPayload::new(*term, DAILY_LIMIT))
        .collect();

    let weekly = WEEKLY_ORGANISMS
        .iter()
        .map(|organism| IngestJobPayload::new(DEFAULT_SEARCH_TERM, WEEKLY_LIMIT).with_organism(*organism))
        .collect();

    Ok(vec![
        ScheduleEntry::new("daily", DAILY_CRON, daily)?,
        ScheduleEntry::new("weekly", WEEKLY_CRON, weekly)?,
    ])
}

/// Outcome of firing one entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireReport {
    pub enqueued: usize,
    pub failed: usize,
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Job scheduler
pub struct JobScheduler {
    queue: Arc<dyn JobQueue>,
    entries: Vec<ScheduleEntry>,
    max_attempts: u32,
}

impl JobScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, entries: Vec<ScheduleEntry>) -> Self {
        Self {
            queue,
            entries,
            max_attempts: super::config::DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Enqueue every payload of `entry`.
    ///
    /// Each enqueue is independent: a failure is logged and counted and the
    /// remaining payloads are still enqueued.
    pub async fn fire(&self, entry: &ScheduleEntry) -> FireReport {
        let source = entry.source();
        let mut report = FireReport::default();

        for payload in &entry.payloads {
            let job = NewJob::new(payload.clone(), source.clone()).with_max_attempts(self.max_attempts);
            match self.queue.enqueue(job).await {
                Ok(job_id) => {
                    report.enqueued += 1;
                    tracing::debug!(%job_id, entry = %entry.name, search_term = %payload.search_term, "Scheduled job enqueued");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        entry = %entry.name,
                        search_term = %payload.search_term,
                        organism = ?payload.organism,
                        error = %e,
                        "Failed to enqueue scheduled job"
                    );
                }
            }
        }

        info!(
            entry = %entry.name,
            enqueued = report.enqueued,
            failed = report.failed,
            "Schedule entry fired"
        );
        report
    }

    /// The earliest fire time after `after` and every entry due at it.
    pub fn next_due(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<&ScheduleEntry>)> {
        let upcoming: Vec<_> = self
            .entries
            .iter()
            .filter_map(|entry| entry.next_fire(after).map(|at| (at, entry)))
            .collect();

        let earliest = upcoming.iter().map(|(at, _)| *at).min()?;
        let due = upcoming
            .into_iter()
            .filter(|(at, _)| *at == earliest)
            .map(|(_, entry)| entry)
            .collect();

        Some((earliest, due))
    }

    /// Fire entries on their schedules until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(entries = self.entries.len(), "Scheduler started");
        let mut last_fired: Option<DateTime<Utc>> = None;

        while !is_shutdown(&shutdown) {
            let now = Utc::now();
            let from = last_fired.map_or(now, |last| last.max(now));
            let Some((at, due)) = self.next_due(from) else {
                warn!("No upcoming schedule entries, scheduler exiting");
                break;
            };

            let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next_fire = %at, wait_secs = wait.as_secs(), "Scheduler sleeping");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    for entry in due {
                        self.fire(entry).await;
                    }
                    last_fired = Some(at);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    pub fn start(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest::jobs::JobState;
    use crate::ingest::queue::InMemoryJobQueue;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_default_schedule_contents() {
        let entries = default_schedule().unwrap();
        assert_eq!(entries.len(), 2);

        let daily = &entries[0];
        assert_eq!(daily.source(), "scheduled:daily");
        assert_eq!(daily.payloads.len(), 5);
        assert!(daily.payloads.iter().all(|p| p.limit == 5 && p.organism.is_none()));
        assert_eq!(daily.payloads[4].search_term, "bone loss");

        let weekly = &entries[1];
        assert_eq!(weekly.payloads.len(), 5);
        assert!(weekly
            .payloads
            .iter()
            .all(|p| p.limit == 10 && p.search_term == "space biology"));
        assert_eq!(weekly.payloads[0].organism.as_deref(), Some("Mus musculus"));
    }

    #[test]
    fn test_next_fire_times() {
        let entries = default_schedule().unwrap();
        // 2024-01-01 is a Monday.
        let monday = at(2024, 1, 1, 0);

        assert_eq!(entries[0].next_fire(monday), Some(at(2024, 1, 1, 2)));
        assert_eq!(entries[0].next_fire(at(2024, 1, 1, 2)), Some(at(2024, 1, 2, 2)));
        assert_eq!(entries[1].next_fire(monday), Some(at(2024, 1, 7, 3)));
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        assert!(ScheduleEntry::new("broken", "not a cron", vec![]).is_err());
    }

    #[test]
    fn test_next_due_picks_earliest() {
        let scheduler = JobScheduler::new(
            Arc::new(InMemoryJobQueue::new()),
            default_schedule().unwrap(),
        );

        let (when, due) = scheduler.next_due(at(2024, 1, 7, 2)).unwrap();
        assert_eq!(when, at(2024, 1, 7, 3));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "weekly");

        let (when, due) = scheduler.next_due(at(2024, 1, 7, 1)).unwrap();
        assert_eq!(when, at(2024, 1, 7, 2));
        assert_eq!(due[0].name, "daily");
    }

    #[tokio::test]
    async fn test_fire_enqueues_each_payload() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = JobScheduler::new(queue.clone(), default_schedule().unwrap());

        let report = scheduler.fire(&scheduler.entries()[1]).await;
        assert_eq!(report, FireReport { enqueued: 5, failed: 0 });
        assert_eq!(queue.count_in_state(JobState::Waiting).await, 5);

        let job = queue.claim_next("w").await.unwrap().unwrap();
        assert_eq!(job.source, "scheduled:weekly");
        assert_eq!(job.max_attempts, 3);
    }
}
