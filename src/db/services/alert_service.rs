//! Data access for user-visible alert records.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use uuid::Uuid;

use crate::db::entities::alert;
use crate::db::enums::AlertSeverity;

pub struct NewAlert {
    pub user_id: Uuid,
    pub website_id: Uuid,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

pub async fn create_alert(
    db: &DatabaseConnection,
    new_alert: NewAlert,
) -> Result<alert::Model, DbErr> {
    alert::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(new_alert.user_id),
        website_id: Set(new_alert.website_id),
        alert_type: Set(new_alert.alert_type),
        severity: Set(new_alert.severity),
        message: Set(new_alert.message),
        resolved: Set(false),
        sent_at: Set(new_alert.sent_at),
    }
    .insert(db)
    .await
}
