//! Data access for security scans.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

use crate::db::entities::{prelude::*, security_scan, website};

pub struct NewScan {
    pub website_id: Uuid,
    pub risk_score: i32,
    pub findings: String,
    pub scanned_at: DateTime<Utc>,
}

pub async fn create_scan(
    db: &DatabaseConnection,
    new_scan: NewScan,
) -> Result<security_scan::Model, DbErr> {
    security_scan::ActiveModel {
        id: Set(Uuid::new_v4()),
        website_id: Set(new_scan.website_id),
        risk_score: Set(new_scan.risk_score),
        findings: Set(new_scan.findings),
        scanned_at: Set(new_scan.scanned_at),
    }
    .insert(db)
    .await
}

pub async fn recent_scans(
    db: &DatabaseConnection,
    website_id: Uuid,
    limit: u64,
) -> Result<Vec<security_scan::Model>, DbErr> {
    SecurityScan::find()
        .filter(security_scan::Column::WebsiteId.eq(website_id))
        .order_by_desc(security_scan::Column::ScannedAt)
        .limit(limit)
        .all(db)
        .await
}

/// Latest scans across every website the user owns, for the dashboard.
pub async fn latest_scans_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
    limit: u64,
) -> Result<Vec<security_scan::Model>, DbErr> {
    SecurityScan::find()
        .join(JoinType::InnerJoin, security_scan::Relation::Website.def())
        .filter(website::Column::UserId.eq(user_id))
        .order_by_desc(security_scan::Column::ScannedAt)
        .limit(limit)
        .all(db)
        .await
}
