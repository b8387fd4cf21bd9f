//! Data access for owner accounts. The orchestrator only reads users, to
//! resolve notification recipients; account management lives in the
//! external API.

use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use uuid::Uuid;

use crate::db::entities::{prelude::*, user};

pub async fn get_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<Option<user::Model>, DbErr> {
    User::find_by_id(user_id).one(db).await
}
