//! Per-participant split values of an expense.
//!
//! Rows of a member who later left the group are kept so past expenses stay
//! correct.

use sea_orm::{ActiveValue, entity::prelude::*};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub expense_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub split_value: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) fn row(expense_id: &str, user_id: &str, split_value: f64) -> ActiveModel {
    ActiveModel {
        expense_id: ActiveValue::Set(expense_id.to_string()),
        user_id: ActiveValue::Set(user_id.to_string()),
        split_value: ActiveValue::Set(split_value),
    }
}
