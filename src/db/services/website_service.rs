//! Data access for websites: lookups, ownership-scoped lookups, and the
//! status/uptime mutations performed by the monitoring engine.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::db::entities::{prelude::*, website};
use crate::db::enums::WebsiteStatus;

pub async fn get_website(
    db: &DatabaseConnection,
    website_id: Uuid,
) -> Result<Option<website::Model>, DbErr> {
    Website::find_by_id(website_id).one(db).await
}

/// Returns the website only when it belongs to `user_id`.
pub async fn get_owned_website(
    db: &DatabaseConnection,
    user_id: Uuid,
    website_id: Uuid,
) -> Result<Option<website::Model>, DbErr> {
    Website::find_by_id(website_id)
        .filter(website::Column::UserId.eq(user_id))
        .one(db)
        .await
}

pub async fn list_websites(db: &DatabaseConnection) -> Result<Vec<website::Model>, DbErr> {
    Website::find().all(db).await
}

pub async fn update_status(
    db: &DatabaseConnection,
    website: website::Model,
    status: WebsiteStatus,
    checked_at: DateTime<Utc>,
) -> Result<website::Model, DbErr> {
    let mut active: website::ActiveModel = website.into();
    active.status = Set(status);
    active.last_checked = Set(Some(checked_at));
    active.updated_at = Set(checked_at);
    active.update(db).await
}

pub async fn update_uptime(
    db: &DatabaseConnection,
    website: website::Model,
    uptime_percentage: f64,
) -> Result<website::Model, DbErr> {
    let mut active: website::ActiveModel = website.into();
    active.uptime_percentage = Set(Some(uptime_percentage));
    active.update(db).await
}
