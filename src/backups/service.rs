//! Backup engine: capture, upload, retention, and restore.
//!
//! Every backup attempt leaves exactly one terminal record, completed or
//! failed. Restore is single-flight per website; concurrent attempts are
//! rejected rather than queued.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::db::entities::{backup, website};
use crate::db::enums::BackupStatus;
use crate::db::services::{backup_service, user_service, website_service};
use crate::error::ServiceError;
use crate::notifications::NotificationService;

use super::storage::{BackupStorage, ObjectStore};
use super::transport::{RestoreOutcome, Snapshot, Transport, TransportError, TransportKind};

const BACKUP_LIST_LIMIT: u64 = 30;

pub struct BackupService {
    db: Arc<DatabaseConnection>,
    storage: Option<Arc<dyn ObjectStore>>,
    notifier: Arc<NotificationService>,
    clock: SharedClock,
    retention_days: i64,
    restores_in_flight: DashMap<Uuid, ()>,
}

/// Releases the per-website restore slot when the restore finishes,
/// including on error paths.
struct RestoreGuard<'a> {
    slots: &'a DashMap<Uuid, ()>,
    website_id: Uuid,
}

impl<'a> RestoreGuard<'a> {
    fn try_acquire(slots: &'a DashMap<Uuid, ()>, website_id: Uuid) -> Option<Self> {
        match slots.entry(website_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self { slots, website_id })
            }
        }
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.slots.remove(&self.website_id);
    }
}

impl BackupService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        storage: Option<Arc<dyn ObjectStore>>,
        notifier: Arc<NotificationService>,
        clock: SharedClock,
        retention_days: i64,
    ) -> Self {
        Self {
            db,
            storage,
            notifier,
            clock,
            retention_days,
            restores_in_flight: DashMap::new(),
        }
    }

    /// Captures a snapshot of the website, uploads it, records the outcome,
    /// and applies retention. On capture or upload failure a failed record
    /// is written, the owner is notified, and the error is re-raised so the
    /// job layer can retry.
    pub async fn perform_backup(&self, website_id: Uuid) -> Result<backup::Model, ServiceError> {
        let website = website_service::get_website(&self.db, website_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Website not found".to_string()))?;

        let transport = TransportKind::resolve(&website);
        info!(url = %website.url, transport = transport.name(), "starting backup");

        match self.capture_and_store(&website, transport).await {
            Ok((file_path, file_size)) => {
                let record = backup_service::create_backup(
                    &self.db,
                    backup_service::NewBackup {
                        website_id,
                        file_path,
                        file_size,
                        status: BackupStatus::Completed,
                        backup_type: "full".to_string(),
                        created_at: self.clock.now(),
                    },
                )
                .await?;

                // Retention trouble is not a backup failure; the snapshot
                // itself is safely stored at this point.
                if let Err(e) = self.cleanup_old_backups(website_id).await {
                    warn!(%website_id, error = %e, "retention sweep failed");
                }
                info!(url = %website.url, size = record.file_size, "backup completed");
                Ok(record)
            }
            Err(e) => {
                error!(url = %website.url, error = %e, "backup failed");
                let recorded = backup_service::create_backup(
                    &self.db,
                    backup_service::NewBackup {
                        website_id,
                        file_path: String::new(),
                        file_size: 0,
                        status: BackupStatus::Failed,
                        backup_type: "full".to_string(),
                        created_at: self.clock.now(),
                    },
                )
                .await;
                if let Err(db_err) = recorded {
                    error!(%website_id, error = %db_err, "failed to record failed backup");
                }
                if let Ok(Some(owner)) =
                    user_service::get_user(&self.db, website.user_id).await
                {
                    self.notifier
                        .send_backup_failure(&owner.email, &website.name, &e.to_string())
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn capture_and_store(
        &self,
        website: &website::Model,
        transport: TransportKind,
    ) -> Result<(String, i64), ServiceError> {
        let snapshot = match transport {
            TransportKind::Ssh(t) => t.capture().await?,
            TransportKind::Sftp(t) => t.capture().await?,
            TransportKind::None => metadata_snapshot(website, self.clock.now()),
        };
        let file_size = snapshot.content.len() as i64;

        let file_path = match &self.storage {
            Some(storage) => {
                let key = BackupStorage::object_key(website.id, &snapshot.file_name);
                storage
                    .upload(&key, snapshot.content, snapshot.content_type)
                    .await?;
                key
            }
            None => {
                warn!(url = %website.url, "object storage not configured, recording metadata only");
                String::new()
            }
        };
        Ok((file_path, file_size))
    }

    /// Deletes backups older than the retention window. The stored object
    /// goes first; if that delete fails the row is kept so the next sweep
    /// retries, never orphaning an object.
    pub async fn cleanup_old_backups(&self, website_id: Uuid) -> Result<usize, ServiceError> {
        let cutoff = self.clock.now() - chrono::Duration::days(self.retention_days);
        let expired = backup_service::backups_older_than(&self.db, website_id, cutoff).await?;
        let mut deleted = 0usize;

        for record in expired {
            if !record.file_path.is_empty() {
                match &self.storage {
                    Some(storage) => {
                        if let Err(e) = storage.delete(&record.file_path).await {
                            warn!(key = %record.file_path, error = %e, "object delete failed, keeping record");
                            continue;
                        }
                    }
                    None => {
                        warn!(key = %record.file_path, "object storage not configured, keeping record");
                        continue;
                    }
                }
            }
            backup_service::delete_backup(&self.db, record).await?;
            deleted += 1;
        }

        if deleted > 0 {
            info!(%website_id, deleted, "expired backups removed");
        }
        Ok(deleted)
    }

    /// Pushes a stored archive back to the origin host. SSH transports
    /// extract in place; SFTP uploads for manual extraction.
    pub async fn restore_backup(
        &self,
        user_id: Uuid,
        backup_id: Uuid,
    ) -> Result<RestoreOutcome, ServiceError> {
        let (record, website) = backup_service::get_backup_with_website(&self.db, backup_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Backup not found".to_string()))?;
        if website.user_id != user_id {
            return Err(ServiceError::Unauthorized(
                "backup does not belong to the requesting user".to_string(),
            ));
        }

        let _slot = RestoreGuard::try_acquire(&self.restores_in_flight, website.id)
            .ok_or(ServiceError::RestoreInProgress)?;

        let storage = self
            .storage
            .as_ref()
            .filter(|_| !record.file_path.is_empty())
            .ok_or_else(|| {
                ServiceError::Storage("No backup file available to restore".to_string())
            })?;
        let archive = storage.download(&record.file_path).await?;

        info!(url = %website.url, backup_id = %record.id, "starting restore");
        let outcome = match TransportKind::resolve(&website) {
            TransportKind::Ssh(t) => t.restore(archive).await?,
            TransportKind::Sftp(t) => t.restore(archive).await?,
            TransportKind::None => return Err(TransportError::NoRestoreMethod.into()),
        };
        info!(url = %website.url, ?outcome, "restore finished");
        Ok(outcome)
    }

    /// Ownership-scoped listing for the external HTTP layer.
    pub async fn get_backups(
        &self,
        user_id: Uuid,
        website_id: Uuid,
    ) -> Result<Vec<backup::Model>, ServiceError> {
        website_service::get_owned_website(&self.db, user_id, website_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Website not found".to_string()))?;
        Ok(backup_service::recent_backups(&self.db, website_id, BACKUP_LIST_LIMIT).await?)
    }
}

/// Fallback snapshot when a website has no usable credentials: a small
/// JSON document recording what was known at backup time.
fn metadata_snapshot(website: &website::Model, now: DateTime<Utc>) -> Snapshot {
    let body = serde_json::json!({
        "website": website.url,
        "timestamp": now.to_rfc3339(),
        "type": "metadata-only",
        "note": "Full backup requires SSH or SFTP credentials",
    });
    Snapshot {
        file_name: format!("backup-{}-{}.json", website.id, now.timestamp_millis()),
        content: body.to_string().into_bytes(),
        content_type: "application/json",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use crate::db::enums::WebsiteStatus;
    use crate::notifications::{NotificationSender, SenderError};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Mutex;

    struct NoopSender;

    #[async_trait]
    impl NotificationSender for NoopSender {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), SenderError> {
            Ok(())
        }
    }

    struct StubStore {
        fail_delete: bool,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for StubStore {
        async fn upload(
            &self,
            _key: &str,
            _content: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn download(&self, _key: &str) -> Result<Vec<u8>, ServiceError> {
            Ok(Vec::new())
        }

        async fn delete(&self, key: &str) -> Result<(), ServiceError> {
            if self.fail_delete {
                return Err(ServiceError::Storage("bucket unreachable".to_string()));
            }
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    fn notifier() -> Arc<NotificationService> {
        Arc::new(NotificationService::new(Arc::new(NoopSender)))
    }

    fn expired_backup(website_id: Uuid, file_path: &str) -> backup::Model {
        backup::Model {
            id: Uuid::new_v4(),
            website_id,
            file_path: file_path.to_string(),
            file_size: 10,
            status: BackupStatus::Completed,
            backup_type: "full".to_string(),
            created_at: Utc::now() - chrono::Duration::days(60),
        }
    }

    fn row_deleted() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn website() -> website::Model {
        website::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Shop".to_string(),
            url: "https://shop.example".to_string(),
            status: WebsiteStatus::Online,
            last_checked: None,
            uptime_percentage: None,
            ssh_host: None,
            ssh_port: None,
            ssh_user: None,
            ssh_private_key: None,
            ftp_host: None,
            ftp_port: None,
            ftp_user: None,
            ftp_password: None,
            content_root: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn metadata_snapshot_is_valid_json() {
        let site = website();
        let now = Utc::now();
        let snapshot = metadata_snapshot(&site, now);

        let parsed: serde_json::Value = serde_json::from_slice(&snapshot.content).unwrap();
        assert_eq!(parsed["website"], site.url.as_str());
        assert_eq!(parsed["type"], "metadata-only");
        assert_eq!(parsed["timestamp"], now.to_rfc3339());
        assert!(snapshot.file_name.ends_with(".json"));
    }

    #[tokio::test]
    async fn retention_removes_expired_objects_then_rows() {
        let website_id = Uuid::new_v4();
        let stored = expired_backup(website_id, "backups/x/a.tar.gz");
        let metadata_only = expired_backup(website_id, "");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored, metadata_only]])
            .append_exec_results([row_deleted(), row_deleted()])
            .into_connection();
        let store = Arc::new(StubStore {
            fail_delete: false,
            deleted: Mutex::new(Vec::new()),
        });
        let service = BackupService::new(
            Arc::new(db),
            Some(store.clone() as Arc<dyn ObjectStore>),
            notifier(),
            system_clock(),
            30,
        );

        let deleted = service.cleanup_old_backups(website_id).await.unwrap();
        assert_eq!(deleted, 2);
        // Only the row with a stored object touches the store.
        assert_eq!(
            *store.deleted.lock().unwrap(),
            vec!["backups/x/a.tar.gz".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_object_delete_keeps_the_row() {
        let website_id = Uuid::new_v4();
        let stored = expired_backup(website_id, "backups/x/b.tar.gz");
        // No exec results: any row delete would fail the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored]])
            .into_connection();
        let store = Arc::new(StubStore {
            fail_delete: true,
            deleted: Mutex::new(Vec::new()),
        });
        let service = BackupService::new(
            Arc::new(db),
            Some(store.clone() as Arc<dyn ObjectStore>),
            notifier(),
            system_clock(),
            30,
        );

        let deleted = service.cleanup_old_backups(website_id).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(store.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_storage_keeps_rows_with_stored_objects() {
        let website_id = Uuid::new_v4();
        let stored = expired_backup(website_id, "backups/x/c.tar.gz");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored]])
            .into_connection();
        let service =
            BackupService::new(Arc::new(db), None, notifier(), system_clock(), 30);

        assert_eq!(service.cleanup_old_backups(website_id).await.unwrap(), 0);
    }

    #[test]
    fn restore_slot_is_single_flight() {
        let slots = DashMap::new();
        let id = Uuid::new_v4();

        let first = RestoreGuard::try_acquire(&slots, id);
        assert!(first.is_some());
        assert!(RestoreGuard::try_acquire(&slots, id).is_none());

        // Another website is unaffected.
        let other = Uuid::new_v4();
        assert!(RestoreGuard::try_acquire(&slots, other).is_some());

        drop(first);
        assert!(RestoreGuard::try_acquire(&slots, id).is_some());
    }
}
