//! Expense records.
//!
//! An expense belongs to one group, is paid by one member and is split among
//! participants according to its [`SplitType`]. Split rows live in
//! [`expense_splits`](super::expense_splits).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, SplitType, UserRef, split::SplitValues};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: String,
    pub amount: f64,
    pub currency: Currency,
    pub label: String,
    pub kind: String,
    pub payer_id: String,
    pub split_type: SplitType,
    pub date: DateTime<Utc>,
    pub image: Option<String>,
    /// Stored split values keyed by user id (`equal` is recomputed).
    pub split_values: SplitValues,
    /// Currency amount each participant owes.
    pub resolved_amounts: SplitValues,
    pub participants: Vec<UserRef>,
}

/// Ordering for expense listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpenseOrder {
    /// Insertion order (ids are time-ordered).
    #[default]
    Insertion,
    DateAscending,
    DateDescending,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub amount: f64,
    pub currency: String,
    pub label: String,
    pub kind: String,
    pub payer_id: String,
    pub split_type: String,
    pub date: DateTimeUtc,
    pub image: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
    #[sea_orm(has_many = "super::expense_splits::Entity")]
    Splits,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::expense_splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fields of a freshly validated expense, before split rows are attached.
pub(crate) struct NewExpense {
    pub id: Uuid,
    pub group_id: String,
    pub amount: f64,
    pub currency: Currency,
    pub label: String,
    pub kind: String,
    pub payer_id: String,
    pub split_type: SplitType,
    pub date: DateTime<Utc>,
    pub image: Option<String>,
}

impl From<&NewExpense> for ActiveModel {
    fn from(expense: &NewExpense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(expense.group_id.clone()),
            amount: ActiveValue::Set(expense.amount),
            currency: ActiveValue::Set(expense.currency.code().to_string()),
            label: ActiveValue::Set(expense.label.clone()),
            kind: ActiveValue::Set(expense.kind.clone()),
            payer_id: ActiveValue::Set(expense.payer_id.clone()),
            split_type: ActiveValue::Set(expense.split_type.as_str().to_string()),
            date: ActiveValue::Set(expense.date),
            image: ActiveValue::Set(expense.image.clone()),
            created_at: ActiveValue::Set(Utc::now()),
        }
    }
}
