use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use siteguard::backups::{BackupService, BackupStorage, ObjectStore};
use siteguard::clock::system_clock;
use siteguard::config::AppConfig;
use siteguard::db;
use siteguard::jobs::handlers::{BackupJobHandler, MonitorJobHandler};
use siteguard::jobs::{JobKind, JobQueue};
use siteguard::monitoring::MonitoringService;
use siteguard::notifications::senders::email::EmailSender;
use siteguard::notifications::NotificationService;
use siteguard::scheduler::Scheduler;
use siteguard::security::SecurityService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let db = Arc::new(db::connect(&config.database_url).await?);
    info!("database connection established");

    let clock = system_clock();
    let notifier = Arc::new(NotificationService::new(Arc::new(EmailSender::new(
        config.smtp.clone(),
    ))));
    let storage = config
        .storage
        .as_ref()
        .map(|storage_config| Arc::new(BackupStorage::new(storage_config)) as Arc<dyn ObjectStore>);
    if storage.is_none() {
        info!("object storage not configured, backups will record metadata only");
    }

    let monitoring = Arc::new(MonitoringService::new(
        db.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    let backups = Arc::new(BackupService::new(
        db.clone(),
        storage,
        notifier.clone(),
        clock.clone(),
        config.backup_retention_days,
    ));
    let security = Arc::new(SecurityService::new(
        db.clone(),
        notifier,
        clock,
        config.virustotal_api_key.clone(),
    ));

    let queue = Arc::new(JobQueue::new());
    queue.register_worker(
        JobKind::Monitor,
        config.monitor_worker_concurrency,
        Arc::new(MonitorJobHandler::new(monitoring)),
    )?;
    queue.register_worker(
        JobKind::Backup,
        config.backup_worker_concurrency,
        Arc::new(BackupJobHandler::new(backups)),
    )?;

    Arc::new(Scheduler::new(
        db,
        queue,
        security,
        config.job_attempts,
        config.job_backoff,
    ))
    .spawn();

    info!("orchestrator started");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}
