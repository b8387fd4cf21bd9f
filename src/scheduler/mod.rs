//! Periodic sweeps feeding the job queue.
//!
//! Each sweep enumerates every website and fans work out per website, so
//! one broken site can never block the rest of a sweep. Monitoring and
//! backup go through the queue; security scans run inline on the sweep
//! task because they are daily and purely read-only against the origin.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tracing::{error, info};

use crate::db::services::website_service;
use crate::error::ServiceError;
use crate::jobs::{JobKind, JobOptions, JobPayload, JobQueue};
use crate::security::SecurityService;

const MONITOR_INTERVAL: Duration = Duration::from_secs(300);
const BACKUP_INTERVAL: Duration = Duration::from_secs(86_400);
const SECURITY_INTERVAL: Duration = Duration::from_secs(86_400);

/// Completed monitor outcomes are short-lived; backup outcomes stay
/// inspectable for a day.
const MONITOR_OUTCOME_RETENTION: Duration = Duration::from_secs(3_600);
const BACKUP_OUTCOME_RETENTION: Duration = Duration::from_secs(86_400);

pub struct Scheduler {
    db: Arc<DatabaseConnection>,
    queue: Arc<JobQueue>,
    security: Arc<SecurityService>,
    job_attempts: u32,
    job_backoff: Duration,
}

impl Scheduler {
    pub fn new(
        db: Arc<DatabaseConnection>,
        queue: Arc<JobQueue>,
        security: Arc<SecurityService>,
        job_attempts: u32,
        job_backoff: Duration,
    ) -> Self {
        Self {
            db,
            queue,
            security,
            job_attempts,
            job_backoff,
        }
    }

    /// Starts the three sweep loops. Tokio intervals fire immediately, so
    /// every subsystem does a full pass right at startup.
    pub fn spawn(self: Arc<Self>) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.trigger_monitoring_sweep().await {
                    error!(error = %e, "monitoring sweep failed");
                }
            }
        });

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BACKUP_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.trigger_backup_sweep().await {
                    error!(error = %e, "backup sweep failed");
                }
            }
        });

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SECURITY_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = self.trigger_security_sweep().await {
                    error!(error = %e, "security sweep failed");
                }
            }
        });
    }

    pub async fn trigger_monitoring_sweep(&self) -> Result<(), ServiceError> {
        let websites = website_service::list_websites(&self.db).await?;
        info!(count = websites.len(), "monitoring sweep");
        for website in websites {
            let result = self.queue.enqueue(
                JobKind::Monitor,
                JobPayload {
                    website_id: website.id,
                },
                self.job_options(MONITOR_OUTCOME_RETENTION),
            );
            if let Err(e) = result {
                error!(website_id = %website.id, error = %e, "failed to enqueue monitor job");
            }
        }
        Ok(())
    }

    pub async fn trigger_backup_sweep(&self) -> Result<(), ServiceError> {
        let websites = website_service::list_websites(&self.db).await?;
        info!(count = websites.len(), "backup sweep");
        for website in websites {
            let result = self.queue.enqueue(
                JobKind::Backup,
                JobPayload {
                    website_id: website.id,
                },
                self.job_options(BACKUP_OUTCOME_RETENTION),
            );
            if let Err(e) = result {
                error!(website_id = %website.id, error = %e, "failed to enqueue backup job");
            }
        }
        Ok(())
    }

    /// Scans run sequentially; per-website failures are logged and the
    /// sweep continues.
    pub async fn trigger_security_sweep(&self) -> Result<(), ServiceError> {
        let websites = website_service::list_websites(&self.db).await?;
        info!(count = websites.len(), "security sweep");
        for website in websites {
            if let Err(e) = self.security.scan_website(website.id).await {
                error!(website_id = %website.id, error = %e, "security scan failed");
            }
        }
        Ok(())
    }

    fn job_options(&self, retention: Duration) -> JobOptions {
        JobOptions {
            attempts: self.job_attempts,
            backoff: self.job_backoff,
            retention,
        }
    }
}
