//! Groups: named collections of members sharing expenses.
//!
//! A group always has at least one member and exactly one owner, who is one
//! of its members. When the last member leaves the group is deleted.

use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const JOIN_CODE_LEN: usize = 6;
const JOIN_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    pub joined_at: DateTime<Utc>,
    pub last_notification_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub join_code: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Ordered by join time.
    pub members: Vec<Member>,
}

impl Group {
    pub(crate) fn new(name: String, description: String, owner_id: &str, join_code: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            join_code,
            name,
            description,
            owner_id: owner_id.to_string(),
            image: None,
            created_at: Utc::now(),
            members: Vec::new(),
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

/// What happened to the group when a member left.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LeaveOutcome {
    /// A non-owner left; ownership is unchanged.
    Left,
    /// The owner left and `new_owner_id` took over.
    OwnershipTransferred { new_owner_id: String },
    /// The last member left and the group no longer exists.
    GroupDeleted,
}

/// Random lower-case alphanumeric code members use to join.
pub(crate) fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical spelling of a user-typed join code.
pub(crate) fn normalize_join_code(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub join_code: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub image: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_members::Entity")]
    Members,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::group_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Group> for ActiveModel {
    fn from(group: &Group) -> Self {
        Self {
            id: ActiveValue::Set(group.id.clone()),
            join_code: ActiveValue::Set(group.join_code.clone()),
            name: ActiveValue::Set(group.name.clone()),
            description: ActiveValue::Set(group.description.clone()),
            owner_id: ActiveValue::Set(group.owner_id.clone()),
            image: ActiveValue::Set(group.image.clone()),
            created_at: ActiveValue::Set(group.created_at),
        }
    }
}

impl Model {
    pub(crate) fn into_group(self, members: Vec<Member>) -> Group {
        Group {
            id: self.id,
            join_code: self.join_code,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            image: self.image,
            created_at: self.created_at,
            members,
        }
    }
}
