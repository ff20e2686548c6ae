//! Users table (minimal entity).
//!
//! Identity is owned by an external collaborator; the engine only keeps what
//! the ledger needs: a stable id, a display username and the optional device
//! token reminders are delivered to.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub device_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Id + username pair used wherever a user is displayed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub username: String,
    pub device_token: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Device token, if one is registered and non-blank.
    pub fn device(&self) -> Option<&str> {
        self.device_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            device_token: model.device_token,
            created_at: model.created_at,
        }
    }
}

impl From<&Model> for UserRef {
    fn from(model: &Model) -> Self {
        Self {
            id: model.id.clone(),
            username: model.username.clone(),
        }
    }
}
