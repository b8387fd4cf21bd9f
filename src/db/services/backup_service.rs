//! Data access for backup records: inserts, ownership-scoped listings, and
//! the retention-window query behind the cleanup sweep.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::db::entities::{backup, prelude::*, website};
use crate::db::enums::BackupStatus;

pub struct NewBackup {
    pub website_id: Uuid,
    pub file_path: String,
    pub file_size: i64,
    pub status: BackupStatus,
    pub backup_type: String,
    pub created_at: DateTime<Utc>,
}

pub async fn create_backup(
    db: &DatabaseConnection,
    new_backup: NewBackup,
) -> Result<backup::Model, DbErr> {
    backup::ActiveModel {
        id: Set(Uuid::new_v4()),
        website_id: Set(new_backup.website_id),
        file_path: Set(new_backup.file_path),
        file_size: Set(new_backup.file_size),
        status: Set(new_backup.status),
        backup_type: Set(new_backup.backup_type),
        created_at: Set(new_backup.created_at),
    }
    .insert(db)
    .await
}

/// A backup together with its website, for ownership checks on restore.
pub async fn get_backup_with_website(
    db: &DatabaseConnection,
    backup_id: Uuid,
) -> Result<Option<(backup::Model, website::Model)>, DbErr> {
    let found = Backup::find_by_id(backup_id)
        .find_also_related(Website)
        .one(db)
        .await?;

    // A backup without a website would violate FK integrity; treat it as
    // absent rather than surfacing a broken pair.
    Ok(found.and_then(|(backup, website)| website.map(|w| (backup, w))))
}

pub async fn recent_backups(
    db: &DatabaseConnection,
    website_id: Uuid,
    limit: u64,
) -> Result<Vec<backup::Model>, DbErr> {
    Backup::find()
        .filter(backup::Column::WebsiteId.eq(website_id))
        .order_by_desc(backup::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await
}

pub async fn backups_older_than(
    db: &DatabaseConnection,
    website_id: Uuid,
    cutoff: DateTime<Utc>,
) -> Result<Vec<backup::Model>, DbErr> {
    Backup::find()
        .filter(backup::Column::WebsiteId.eq(website_id))
        .filter(backup::Column::CreatedAt.lt(cutoff))
        .all(db)
        .await
}

pub async fn delete_backup(db: &DatabaseConnection, backup: backup::Model) -> Result<(), DbErr> {
    backup.delete(db).await?;
    Ok(())
}
