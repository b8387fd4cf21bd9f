//! Job handlers bridging the queue to the engines.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backups::BackupService;
use crate::error::ServiceError;
use crate::monitoring::MonitoringService;

use super::{JobHandler, JobPayload};

pub struct MonitorJobHandler {
    monitoring: Arc<MonitoringService>,
}

impl MonitorJobHandler {
    pub fn new(monitoring: Arc<MonitoringService>) -> Self {
        Self { monitoring }
    }
}

#[async_trait]
impl JobHandler for MonitorJobHandler {
    async fn execute(&self, payload: JobPayload) -> Result<(), ServiceError> {
        self.monitoring.check_website(payload.website_id).await?;
        Ok(())
    }
}

pub struct BackupJobHandler {
    backups: Arc<BackupService>,
}

impl BackupJobHandler {
    pub fn new(backups: Arc<BackupService>) -> Self {
        Self { backups }
    }
}

#[async_trait]
impl JobHandler for BackupJobHandler {
    async fn execute(&self, payload: JobPayload) -> Result<(), ServiceError> {
        self.backups.perform_backup(payload.website_id).await?;
        Ok(())
    }
}
