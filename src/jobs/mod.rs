//! In-process job queue with per-kind worker pools.
//!
//! The scheduler enqueues one unit of work per website per subsystem and
//! never waits on execution; workers own the attempt/backoff policy. A
//! failed attempt is re-enqueued after `backoff * 2^(attempt-1)` until the
//! attempt limit is reached, at which point the job is logged as permanently
//! failed without crashing the pool.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ServiceError;

pub mod handlers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Monitor,
    Backup,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Monitor => "monitor",
            JobKind::Backup => "backup",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobPayload {
    pub website_id: Uuid,
}

/// Job envelope options: retry budget, backoff base, and how long the
/// completed outcome is kept for inspection (short for monitor jobs, long
/// for backup jobs to tolerate slow transfers).
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Duration,
    pub retention: Duration,
}

#[derive(Debug, Clone)]
struct Job {
    id: Uuid,
    kind: JobKind,
    payload: JobPayload,
    options: JobOptions,
    attempt: u32,
}

#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub kind: JobKind,
    pub website_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub retention: Duration,
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job queue is shut down")]
    Closed,
    #[error("worker for {0} is already registered")]
    WorkerAlreadyRegistered(&'static str),
}

#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn execute(&self, payload: JobPayload) -> Result<(), ServiceError>;
}

pub struct JobQueue {
    monitor_tx: mpsc::UnboundedSender<Job>,
    backup_tx: mpsc::UnboundedSender<Job>,
    monitor_rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    backup_rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    completed: Arc<DashMap<Uuid, CompletedJob>>,
}

impl JobQueue {
    pub fn new() -> Self {
        let (monitor_tx, monitor_rx) = mpsc::unbounded_channel();
        let (backup_tx, backup_rx) = mpsc::unbounded_channel();
        Self {
            monitor_tx,
            backup_tx,
            monitor_rx: Mutex::new(Some(monitor_rx)),
            backup_rx: Mutex::new(Some(backup_rx)),
            completed: Arc::new(DashMap::new()),
        }
    }

    pub fn enqueue(
        &self,
        kind: JobKind,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<(), QueueError> {
        let job = Job {
            id: Uuid::new_v4(),
            kind,
            payload,
            options,
            attempt: 1,
        };
        self.sender(kind).send(job).map_err(|_| QueueError::Closed)
    }

    /// Spawns the dispatcher for one job kind. Handler invocations run on
    /// separate tasks gated by a semaphore, so a stalled website cannot
    /// delay the others beyond the concurrency limit.
    pub fn register_worker(
        &self,
        kind: JobKind,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), QueueError> {
        let mut slot = match kind {
            JobKind::Monitor => self.monitor_rx.lock(),
            JobKind::Backup => self.backup_rx.lock(),
        }
        .map_err(|_| QueueError::Closed)?;
        let mut rx = slot
            .take()
            .ok_or(QueueError::WorkerAlreadyRegistered(kind.as_str()))?;
        drop(slot);

        let retry_tx = self.sender(kind).clone();
        let completed = self.completed.clone();
        let semaphore = Arc::new(Semaphore::new(concurrency));

        tokio::spawn(async move {
            info!(kind = kind.as_str(), concurrency, "worker pool started");
            while let Some(job) = rx.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let handler = handler.clone();
                let retry_tx = retry_tx.clone();
                let completed = completed.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_job(job, handler, retry_tx, completed).await;
                });
            }
        });
        Ok(())
    }

    /// Recently completed jobs, pruned by each job's retention window.
    pub fn recent_outcomes(&self) -> Vec<CompletedJob> {
        prune_completed(&self.completed, Utc::now());
        self.completed.iter().map(|e| e.value().clone()).collect()
    }

    fn sender(&self, kind: JobKind) -> &mpsc::UnboundedSender<Job> {
        match kind {
            JobKind::Monitor => &self.monitor_tx,
            JobKind::Backup => &self.backup_tx,
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(
    job: Job,
    handler: Arc<dyn JobHandler>,
    retry_tx: mpsc::UnboundedSender<Job>,
    completed: Arc<DashMap<Uuid, CompletedJob>>,
) {
    let website_id = job.payload.website_id;
    match handler.execute(job.payload.clone()).await {
        Ok(()) => {
            completed.insert(
                job.id,
                CompletedJob {
                    kind: job.kind,
                    website_id,
                    finished_at: Utc::now(),
                    retention: job.options.retention,
                },
            );
            prune_completed(&completed, Utc::now());
        }
        Err(e) if !e.is_retryable() => {
            warn!(
                kind = job.kind.as_str(),
                %website_id,
                error = %e,
                "job failed with a non-retryable error"
            );
        }
        Err(e) => {
            if job.attempt < job.options.attempts {
                let delay = backoff_delay(job.options.backoff, job.attempt);
                warn!(
                    kind = job.kind.as_str(),
                    %website_id,
                    attempt = job.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "job attempt failed, retrying"
                );
                let retry = Job {
                    attempt: job.attempt + 1,
                    ..job
                };
                // Sleep on a side task so the backoff does not pin a
                // worker slot.
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if retry_tx.send(retry).is_err() {
                        error!(%website_id, "queue closed, dropping retry");
                    }
                });
            } else {
                error!(
                    kind = job.kind.as_str(),
                    %website_id,
                    attempts = job.options.attempts,
                    error = %e,
                    "job permanently failed"
                );
            }
        }
    }
}

/// Exponential backoff: `base * 2^(attempt-1)` for the attempt that just
/// failed (attempts are 1-based).
fn backoff_delay(base: Duration, failed_attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(failed_attempt.saturating_sub(1)))
}

fn prune_completed(completed: &DashMap<Uuid, CompletedJob>, now: DateTime<Utc>) {
    completed.retain(|_, c| {
        chrono::Duration::from_std(c.retention)
            .map(|retention| now - c.finished_at <= retention)
            .unwrap_or(false)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHandler {
        calls: AtomicU32,
        fail_first: u32,
        not_found: bool,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn execute(&self, _payload: JobPayload) -> Result<(), ServiceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.not_found {
                return Err(ServiceError::NotFound("website".to_string()));
            }
            if call <= self.fail_first {
                return Err(ServiceError::Storage("transient".to_string()));
            }
            Ok(())
        }
    }

    fn options(attempts: u32) -> JobOptions {
        JobOptions {
            attempts,
            backoff: Duration::from_secs(5),
            retention: Duration::from_secs(3600),
        }
    }

    async fn wait_for_calls(handler: &Arc<CountingHandler>, expected: u32) {
        tokio::time::timeout(Duration::from_secs(600), async {
            while handler.calls.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("handler was not called the expected number of times");
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn job_retries_until_success() {
        let queue = JobQueue::new();
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: 2,
            not_found: false,
        });
        queue
            .register_worker(JobKind::Monitor, 5, handler.clone())
            .unwrap();

        queue
            .enqueue(
                JobKind::Monitor,
                JobPayload {
                    website_id: Uuid::new_v4(),
                },
                options(3),
            )
            .unwrap();

        wait_for_calls(&handler, 3).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        // Third attempt succeeded, so the outcome is retained.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.recent_outcomes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_stop_retrying() {
        let queue = JobQueue::new();
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            not_found: false,
        });
        queue
            .register_worker(JobKind::Backup, 2, handler.clone())
            .unwrap();

        queue
            .enqueue(
                JobKind::Backup,
                JobPayload {
                    website_id: Uuid::new_v4(),
                },
                options(3),
            )
            .unwrap();

        wait_for_calls(&handler, 3).await;
        // Give a generous window for any (incorrect) fourth attempt.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(queue.recent_outcomes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_not_retried() {
        let queue = JobQueue::new();
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: 0,
            not_found: true,
        });
        queue
            .register_worker(JobKind::Monitor, 5, handler.clone())
            .unwrap();

        queue
            .enqueue(
                JobKind::Monitor,
                JobPayload {
                    website_id: Uuid::new_v4(),
                },
                options(3),
            )
            .unwrap();

        wait_for_calls(&handler, 1).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn double_registration_is_rejected() {
        let queue = JobQueue::new();
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: 0,
            not_found: false,
        });
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();
        assert!(queue.register_worker(JobKind::Monitor, 1, handler.clone()).is_ok());
        assert!(matches!(
            queue.register_worker(JobKind::Monitor, 1, handler),
            Err(QueueError::WorkerAlreadyRegistered(_))
        ));
    }

    #[test]
    fn prune_drops_entries_past_retention() {
        let completed = DashMap::new();
        let now = Utc::now();
        completed.insert(
            Uuid::new_v4(),
            CompletedJob {
                kind: JobKind::Monitor,
                website_id: Uuid::new_v4(),
                finished_at: now - chrono::Duration::hours(2),
                retention: Duration::from_secs(3600),
            },
        );
        completed.insert(
            Uuid::new_v4(),
            CompletedJob {
                kind: JobKind::Backup,
                website_id: Uuid::new_v4(),
                finished_at: now - chrono::Duration::hours(2),
                retention: Duration::from_secs(86400),
            },
        );

        prune_completed(&completed, now);
        assert_eq!(completed.len(), 1);
    }
}
