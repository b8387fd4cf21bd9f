use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::WebsiteStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "websites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub url: String,
    pub status: WebsiteStatus,
    pub last_checked: Option<ChronoDateTimeUtc>,
    pub uptime_percentage: Option<f64>,
    pub ssh_host: Option<String>,
    pub ssh_port: Option<i32>,
    pub ssh_user: Option<String>,
    #[serde(skip_serializing)]
    pub ssh_private_key: Option<String>,
    pub ftp_host: Option<String>,
    pub ftp_port: Option<i32>,
    pub ftp_user: Option<String>,
    #[serde(skip_serializing)]
    pub ftp_password: Option<String>,
    pub content_root: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::check::Entity")]
    Check,

    #[sea_orm(has_many = "super::backup::Entity")]
    Backup,

    #[sea_orm(has_many = "super::security_scan::Entity")]
    SecurityScan,

    #[sea_orm(has_many = "super::alert::Entity")]
    Alert,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::check::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Check.def()
    }
}

impl Related<super::backup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Backup.def()
    }
}

impl Related<super::security_scan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SecurityScan.def()
    }
}

impl Related<super::alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
