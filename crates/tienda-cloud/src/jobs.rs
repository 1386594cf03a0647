//! # Sync Jobs
//!
//! Bulk stock pushes run as observable background jobs.
//!
//! ## Job Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Job Flow                                    │
//! │                                                                         │
//! │  POST /api/products/stock/bulk-update                                  │
//! │       │  (local commit done)                                           │
//! │       ▼                                                                 │
//! │  SyncJobs::enqueue(changes) ──try_send──► mpsc (bounded)               │
//! │       │                                     │                           │
//! │       │ Full ──► CloudError::QueueFull       │                           │
//! │       │          (503 BUSY)                 ▼                           │
//! │       ▼                              ┌─────────────┐                    │
//! │  202 { job_id }                      │   worker    │  one at a time     │
//! │                                      └──────┬──────┘                    │
//! │                                             │ per linked change:        │
//! │                                             │   attempt, backoff,       │
//! │                                             │   up to max_retries       │
//! │                                             ▼                           │
//! │  GET /stock/jobs/{id} ◄── status map: queued → running →               │
//! │                                       completed | failed                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::SharedCloudStore;
use crate::config::SyncConfig;
use crate::error::{CloudError, CloudResult};
use tienda_core::{CloudLink, StockChange};

/// Finished jobs kept for status queries.
const MAX_FINISHED_JOBS: usize = 100;

/// Error messages kept per job.
const MAX_JOB_ERRORS: usize = 20;

// =============================================================================
// Job State
// =============================================================================

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// What `GET /api/products/stock/jobs/{id}` reports.
#[derive(Debug, Clone, Serialize)]
pub struct SyncJobState {
    pub id: Uuid,
    pub status: JobStatus,
    /// Linked changes to push.
    pub total: usize,
    pub pushed: usize,
    pub failed: usize,
    /// Changes without a cloud link, never pushed.
    pub skipped: usize,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct SyncJob {
    id: Uuid,
    items: Vec<(i64, CloudLink, i64)>,
}

type JobMap = Arc<RwLock<HashMap<Uuid, SyncJobState>>>;

// =============================================================================
// Handle
// =============================================================================

/// Handle for enqueueing jobs and reading their status. Cheap to clone.
#[derive(Clone)]
pub struct SyncJobs {
    tx: mpsc::Sender<SyncJob>,
    jobs: JobMap,
}

impl SyncJobs {
    /// Starts the worker on the current runtime.
    pub fn spawn(store: SharedCloudStore, config: SyncConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let jobs: JobMap = Arc::new(RwLock::new(HashMap::new()));

        let worker = Worker {
            store,
            config,
            jobs: jobs.clone(),
            rx,
        };
        tokio::spawn(worker.run());

        SyncJobs { tx, jobs }
    }

    /// Queues a push of `changes`. Unlinked changes are counted as skipped.
    ///
    /// ## Errors
    /// - `QueueFull` when the bounded queue has no room
    /// - `ShuttingDown` when the worker has stopped
    pub async fn enqueue(&self, changes: &[StockChange]) -> CloudResult<Uuid> {
        let id = Uuid::new_v4();
        let items: Vec<(i64, CloudLink, i64)> = changes
            .iter()
            .filter_map(|c| c.cloud.map(|link| (c.variant_id, link, c.new_stock)))
            .collect();

        let state = SyncJobState {
            id,
            status: JobStatus::Queued,
            total: items.len(),
            pushed: 0,
            failed: 0,
            skipped: changes.len() - items.len(),
            errors: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        };

        // Registered first so the worker always finds the entry
        self.jobs.write().await.insert(id, state);

        match self.tx.try_send(SyncJob { id, items }) {
            Ok(()) => {
                debug!(job_id = %id, "Sync job queued");
                Ok(id)
            }
            Err(err) => {
                self.jobs.write().await.remove(&id);
                match err {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!("Sync queue full, rejecting job");
                        Err(CloudError::QueueFull)
                    }
                    mpsc::error::TrySendError::Closed(_) => Err(CloudError::ShuttingDown),
                }
            }
        }
    }

    /// Current state of a job.
    pub async fn status(&self, id: Uuid) -> Option<SyncJobState> {
        self.jobs.read().await.get(&id).cloned()
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    store: SharedCloudStore,
    config: SyncConfig,
    jobs: JobMap,
    rx: mpsc::Receiver<SyncJob>,
}

impl Worker {
    async fn run(mut self) {
        info!(
            capacity = self.config.queue_capacity,
            max_retries = self.config.max_retries,
            "Sync worker starting"
        );

        while let Some(job) = self.rx.recv().await {
            self.process(job).await;
        }

        info!("Sync worker stopped");
    }

    async fn process(&self, job: SyncJob) {
        self.update(job.id, |s| s.status = JobStatus::Running).await;

        for &(variant_id, link, stock) in &job.items {
            match self.push_with_retry(link, stock).await {
                Ok(()) => self.update(job.id, |s| s.pushed += 1).await,
                Err(e) => {
                    error!(
                        job_id = %job.id,
                        variant_id,
                        cloud_variant_id = link.variant_id,
                        error = %e,
                        "Stock push gave up"
                    );
                    let message = format!("variant {}: {}", variant_id, e);
                    self.update(job.id, move |s| {
                        s.failed += 1;
                        if s.errors.len() < MAX_JOB_ERRORS {
                            s.errors.push(message);
                        }
                    })
                    .await;
                }
            }
        }

        self.update(job.id, |s| {
            s.status = if s.failed == 0 {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            };
            s.finished_at = Some(Utc::now());
        })
        .await;

        if let Some(state) = self.jobs.read().await.get(&job.id) {
            info!(
                job_id = %job.id,
                pushed = state.pushed,
                failed = state.failed,
                skipped = state.skipped,
                "Sync job finished"
            );
        }
        self.prune().await;
    }

    /// First attempt plus up to `max_retries` retries of retryable errors.
    async fn push_with_retry(&self, link: CloudLink, stock: i64) -> CloudResult<()> {
        let mut policy = self.create_backoff();
        let mut retries = 0;
        loop {
            match self.store.update_variant_stock(link, stock).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    let wait = policy.next_backoff().unwrap_or(self.config.max_backoff);
                    debug!(
                        cloud_variant_id = link.variant_id,
                        retries,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Retrying stock push"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // bounded by max_retries instead
            ..Default::default()
        }
    }

    async fn update(&self, id: Uuid, apply: impl FnOnce(&mut SyncJobState)) {
        if let Some(state) = self.jobs.write().await.get_mut(&id) {
            apply(state);
        }
    }

    /// Drops the oldest finished jobs beyond the retention limit.
    async fn prune(&self) {
        let mut jobs = self.jobs.write().await;
        let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
            .values()
            .filter(|s| s.status.is_finished())
            .map(|s| (s.finished_at.unwrap_or(s.created_at), s.id))
            .collect();
        if finished.len() <= MAX_FINISHED_JOBS {
            return;
        }
        finished.sort();
        let excess = finished.len() - MAX_FINISHED_JOBS;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CloudCall, RecordingCloudStore};
    use std::time::Duration;

    fn quick_config(capacity: usize) -> SyncConfig {
        SyncConfig {
            queue_capacity: capacity,
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    fn linked(variant_id: i64, stock: i64) -> StockChange {
        StockChange {
            variant_id,
            new_stock: stock,
            cloud: Some(CloudLink {
                product_id: 1,
                variant_id: 100 + variant_id,
            }),
        }
    }

    async fn wait_for(jobs: &SyncJobs, id: Uuid, done: impl Fn(JobStatus) -> bool) -> SyncJobState {
        for _ in 0..500 {
            if let Some(state) = jobs.status(id).await {
                if done(state.status) {
                    return state;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("job {} did not reach the expected state", id);
    }

    #[tokio::test]
    async fn test_job_completes_and_reports_counts() {
        let store = Arc::new(RecordingCloudStore::new());
        let jobs = SyncJobs::spawn(store.clone(), quick_config(4));

        let unlinked = StockChange {
            variant_id: 9,
            new_stock: 1,
            cloud: None,
        };
        let id = jobs
            .enqueue(&[linked(1, 5), linked(2, 0), unlinked])
            .await
            .unwrap();

        let state = wait_for(&jobs, id, |s| s.is_finished()).await;
        assert_eq!(state.status, JobStatus::Completed);
        assert_eq!(state.total, 2);
        assert_eq!(state.pushed, 2);
        assert_eq!(state.skipped, 1);
        assert!(state.finished_at.is_some());
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let store = Arc::new(RecordingCloudStore::new());
        store.fail_next(2);
        let jobs = SyncJobs::spawn(store.clone(), quick_config(4));

        let id = jobs.enqueue(&[linked(1, 5)]).await.unwrap();
        let state = wait_for(&jobs, id, |s| s.is_finished()).await;

        assert_eq!(state.status, JobStatus::Completed);
        assert_eq!(store.attempts(), 3);
        assert_eq!(
            store.calls(),
            vec![CloudCall::Stock(
                CloudLink {
                    product_id: 1,
                    variant_id: 101
                },
                5
            )]
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_mark_job_failed() {
        let store = Arc::new(RecordingCloudStore::new());
        store.fail_next(10);
        let jobs = SyncJobs::spawn(store.clone(), quick_config(4));

        let id = jobs.enqueue(&[linked(1, 5)]).await.unwrap();
        let state = wait_for(&jobs, id, |s| s.is_finished()).await;

        assert_eq!(state.status, JobStatus::Failed);
        assert_eq!(state.failed, 1);
        assert_eq!(state.errors.len(), 1);
        // first attempt + 2 retries
        assert_eq!(store.attempts(), 3);
    }

    #[tokio::test]
    async fn test_full_queue_is_rejected() {
        let store = Arc::new(RecordingCloudStore::new());
        let jobs = SyncJobs::spawn(store.clone(), quick_config(1));

        let guard = store.hold().await;
        let running = jobs.enqueue(&[linked(1, 1)]).await.unwrap();
        wait_for(&jobs, running, |s| s == JobStatus::Running).await;

        let queued = jobs.enqueue(&[linked(2, 1)]).await.unwrap();
        assert_eq!(jobs.status(queued).await.unwrap().status, JobStatus::Queued);

        let err = jobs.enqueue(&[linked(3, 1)]).await.unwrap_err();
        assert!(matches!(err, CloudError::QueueFull));

        drop(guard);
        wait_for(&jobs, queued, |s| s.is_finished()).await;
    }

    #[tokio::test]
    async fn test_unknown_job_is_none() {
        let store = Arc::new(RecordingCloudStore::new());
        let jobs = SyncJobs::spawn(store, quick_config(1));
        assert!(jobs.status(Uuid::new_v4()).await.is_none());
    }
}
