//! Data access for reachability checks. Checks are append-only; the only
//! queries are inserts and time-window reads used for uptime derivation.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::db::entities::{check, prelude::*};

pub struct NewCheck {
    pub website_id: Uuid,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub success: bool,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

pub async fn record_check(
    db: &DatabaseConnection,
    new_check: NewCheck,
) -> Result<check::Model, DbErr> {
    check::ActiveModel {
        id: Set(Uuid::new_v4()),
        website_id: Set(new_check.website_id),
        status_code: Set(new_check.status_code),
        response_time_ms: Set(new_check.response_time_ms),
        success: Set(new_check.success),
        error_message: Set(new_check.error_message),
        checked_at: Set(new_check.checked_at),
    }
    .insert(db)
    .await
}

/// All checks for a website with `checked_at >= since`, used for the
/// trailing uptime window.
pub async fn checks_in_window(
    db: &DatabaseConnection,
    website_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<check::Model>, DbErr> {
    Check::find()
        .filter(check::Column::WebsiteId.eq(website_id))
        .filter(check::Column::CheckedAt.gte(since))
        .all(db)
        .await
}

pub async fn recent_checks(
    db: &DatabaseConnection,
    website_id: Uuid,
    limit: u64,
) -> Result<Vec<check::Model>, DbErr> {
    Check::find()
        .filter(check::Column::WebsiteId.eq(website_id))
        .order_by_desc(check::Column::CheckedAt)
        .limit(limit)
        .all(db)
        .await
}
