use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, IntoActiveModel, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    ActivityContext, ActivityKind, AddExpenseCmd, Currency, EngineError, Expense, ExpenseOrder,
    ResultEngine, SplitType, SplitValues, UpdateExpenseCmd, UserRef, expense_splits,
    expenses::{self, NewExpense},
    split::{allocate, resolve_amounts},
    users,
    util::{
        normalize_optional_text, normalize_required_text, normalize_text, parse_uuid,
        validate_amount,
    },
};

use super::{Engine, with_tx};

impl Engine {
    /// Record an expense paid by `cmd.payer_id` and split among participants.
    ///
    /// The payer and every participant must currently belong to the group.
    pub async fn add_expense(&self, cmd: AddExpenseCmd) -> ResultEngine<Expense> {
        let AddExpenseCmd {
            group_id,
            payer_id,
            amount,
            currency,
            label,
            kind,
            split_type,
            date,
            split,
            image,
        } = cmd;
        let amount = validate_amount(amount)?;
        let label = normalize_required_text(&label, "label")?;
        let kind = normalize_text(&kind);
        let image = normalize_optional_text(image.as_deref());
        let values = allocate(
            amount,
            split_type,
            &split.participants,
            split.values.as_ref(),
        )?;

        let (expense, entry) = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, &group_id).await?;
            self.require_member(&db_tx, &group_id, &payer_id).await?;
            self.require_participants(&db_tx, &group_id, values.keys(), &HashSet::new())
                .await?;

            let new = NewExpense {
                id: Uuid::now_v7(),
                group_id: group_id.clone(),
                amount,
                currency,
                label,
                kind,
                payer_id: payer_id.clone(),
                split_type,
                date,
                image,
            };
            let model = expenses::ActiveModel::from(&new).insert(&db_tx).await?;
            self.insert_splits(&db_tx, &model.id, &values).await?;

            let entry = self
                .record_activity(
                    &db_tx,
                    &group_id,
                    ActivityKind::AddExpense,
                    &payer_id,
                    &ActivityContext::expense(model.label.clone()),
                    Utc::now(),
                )
                .await;
            let expense = self.expense_view(&db_tx, model).await?;
            Ok((expense, entry))
        })?;

        debug!(
            group_id = %expense.group_id,
            expense_id = %expense.id,
            split_type = %expense.split_type,
            "expense added"
        );
        self.broadcast(entry).await;
        Ok(expense)
    }

    /// Expenses of a group. The caller must be a member.
    pub async fn expenses(
        &self,
        group_id: &str,
        user_id: &str,
        order: ExpenseOrder,
    ) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;

            let query =
                expenses::Entity::find().filter(expenses::Column::GroupId.eq(group_id.to_string()));
            let query = match order {
                ExpenseOrder::Insertion => query.order_by_asc(expenses::Column::Id),
                ExpenseOrder::DateAscending => query
                    .order_by_asc(expenses::Column::Date)
                    .order_by_asc(expenses::Column::Id),
                ExpenseOrder::DateDescending => query
                    .order_by_desc(expenses::Column::Date)
                    .order_by_desc(expenses::Column::Id),
            };
            let models = query.all(&db_tx).await?;
            self.assemble_expenses(&db_tx, models).await
        })
    }

    pub async fn expense(
        &self,
        group_id: &str,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;
            let model = self.require_expense(&db_tx, group_id, expense_id).await?;
            self.expense_view(&db_tx, model).await
        })
    }

    /// Apply a partial update to an expense.
    ///
    /// A new split replaces the whole split set. Changing the type to `equal`
    /// without a split recomputes it over the current participants; changing
    /// it to `shares` or `amounts` requires a split.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        if cmd.is_empty() {
            return Err(EngineError::Validation("no fields to update".to_string()));
        }
        let amount = cmd.amount.map(validate_amount).transpose()?;
        let label = cmd
            .label
            .as_deref()
            .map(|l| normalize_required_text(l, "label"))
            .transpose()?;
        let kind = cmd.kind.as_deref().map(normalize_text);
        let image = cmd
            .image
            .as_ref()
            .map(|image| normalize_optional_text(image.as_deref()));

        let (expense, entry) = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, &cmd.group_id).await?;
            self.require_member(&db_tx, &cmd.group_id, &cmd.user_id)
                .await?;
            let current = self
                .require_expense(&db_tx, &cmd.group_id, cmd.expense_id)
                .await?;

            let old_type = SplitType::try_from(current.split_type.as_str())?;
            let new_type = cmd.split_type.unwrap_or(old_type);
            let new_amount = amount.unwrap_or(current.amount);
            let existing = self.split_user_ids(&db_tx, &current.id).await?;

            let replacement = match &cmd.split {
                Some(split) => {
                    let values = allocate(
                        new_amount,
                        new_type,
                        &split.participants,
                        split.values.as_ref(),
                    )?;
                    let known: HashSet<String> = existing.iter().cloned().collect();
                    self.require_participants(&db_tx, &cmd.group_id, values.keys(), &known)
                        .await?;
                    Some(values)
                }
                None if new_type != old_type && new_type.needs_values() => {
                    return Err(EngineError::InvalidSplit(format!(
                        "changing the split type to {new_type} requires split values"
                    )));
                }
                None if new_type == SplitType::Equal
                    && (old_type != SplitType::Equal || amount.is_some()) =>
                {
                    Some(allocate(new_amount, SplitType::Equal, &existing, None)?)
                }
                None => None,
            };

            let mut active = current.clone().into_active_model();
            let mut changed = false;
            if let Some(amount) = amount {
                active.amount = ActiveValue::Set(amount);
                changed = true;
            }
            if let Some(currency) = cmd.currency {
                active.currency = ActiveValue::Set(currency.code().to_string());
                changed = true;
            }
            if let Some(label) = &label {
                active.label = ActiveValue::Set(label.clone());
                changed = true;
            }
            if let Some(kind) = &kind {
                active.kind = ActiveValue::Set(kind.clone());
                changed = true;
            }
            if new_type != old_type {
                active.split_type = ActiveValue::Set(new_type.as_str().to_string());
                changed = true;
            }
            if let Some(date) = cmd.date {
                active.date = ActiveValue::Set(date);
                changed = true;
            }
            if let Some(image) = &image {
                active.image = ActiveValue::Set(image.clone());
                changed = true;
            }
            let model = if changed {
                active.update(&db_tx).await?
            } else {
                current
            };

            if let Some(values) = &replacement {
                expense_splits::Entity::delete_many()
                    .filter(expense_splits::Column::ExpenseId.eq(model.id.clone()))
                    .exec(&db_tx)
                    .await?;
                self.insert_splits(&db_tx, &model.id, values).await?;
            }

            let entry = self
                .record_activity(
                    &db_tx,
                    &cmd.group_id,
                    ActivityKind::EditExpense,
                    &cmd.user_id,
                    &ActivityContext::expense(model.label.clone()),
                    Utc::now(),
                )
                .await;
            let expense = self.expense_view(&db_tx, model).await?;
            Ok((expense, entry))
        })?;

        debug!(group_id = %expense.group_id, expense_id = %expense.id, "expense updated");
        self.broadcast(entry).await;
        Ok(expense)
    }

    /// Delete an expense and its split rows.
    pub async fn delete_expense(
        &self,
        group_id: &str,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let entry = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;
            let model = self.require_expense(&db_tx, group_id, expense_id).await?;

            expense_splits::Entity::delete_many()
                .filter(expense_splits::Column::ExpenseId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(model.id.clone())
                .exec(&db_tx)
                .await?;

            Ok(self
                .record_activity(
                    &db_tx,
                    group_id,
                    ActivityKind::DeleteExpense,
                    user_id,
                    &ActivityContext::expense(model.label),
                    Utc::now(),
                )
                .await)
        })?;

        debug!(group_id, %expense_id, "expense deleted");
        self.broadcast(entry).await;
        Ok(())
    }

    /// Replace the receipt image reference of an expense; `None` clears it.
    ///
    /// Returns the previous reference.
    pub async fn set_expense_image(
        &self,
        group_id: &str,
        expense_id: Uuid,
        user_id: &str,
        image: Option<&str>,
    ) -> ResultEngine<Option<String>> {
        let image = normalize_optional_text(image);
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_member(&db_tx, group_id, user_id).await?;
            let model = self.require_expense(&db_tx, group_id, expense_id).await?;
            let previous = model.image.clone();
            if previous != image {
                let mut active = model.into_active_model();
                active.image = ActiveValue::Set(image);
                active.update(&db_tx).await?;
            }
            Ok(previous)
        })
    }

    async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        expense_id: Uuid,
    ) -> ResultEngine<expenses::Model> {
        expenses::Entity::find_by_id(expense_id.to_string())
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("expense not exists".to_string()))
    }

    /// Participant ids of an expense, sorted.
    async fn split_user_ids(
        &self,
        db: &DatabaseTransaction,
        expense_id: &str,
    ) -> ResultEngine<Vec<String>> {
        let rows = expense_splits::Entity::find()
            .filter(expense_splits::Column::ExpenseId.eq(expense_id.to_string()))
            .order_by_asc(expense_splits::Column::UserId)
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }

    async fn insert_splits(
        &self,
        db: &DatabaseTransaction,
        expense_id: &str,
        values: &SplitValues,
    ) -> ResultEngine<()> {
        expense_splits::Entity::insert_many(
            values
                .iter()
                .map(|(user_id, value)| expense_splits::row(expense_id, user_id, *value)),
        )
        .exec(db)
        .await?;
        Ok(())
    }

    async fn expense_view(
        &self,
        db: &DatabaseTransaction,
        model: expenses::Model,
    ) -> ResultEngine<Expense> {
        self.assemble_expenses(db, vec![model])
            .await?
            .pop()
            .ok_or_else(|| EngineError::NotFound("expense not exists".to_string()))
    }

    /// Attach split rows and participant names, loading both in batch.
    async fn assemble_expenses(
        &self,
        db: &DatabaseTransaction,
        models: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<Expense>> {
        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let rows = expense_splits::Entity::find()
            .filter(expense_splits::Column::ExpenseId.is_in(ids))
            .all(db)
            .await?;
        let mut splits: HashMap<String, SplitValues> = HashMap::new();
        for row in rows {
            splits
                .entry(row.expense_id)
                .or_default()
                .insert(row.user_id, row.split_value);
        }

        let user_ids: HashSet<String> = splits
            .values()
            .flat_map(|values| values.keys().cloned())
            .collect();
        let names: HashMap<String, UserRef> = users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .iter()
            .map(|user| (user.id.clone(), UserRef::from(user)))
            .collect();

        models
            .into_iter()
            .map(|model| {
                let split_type = SplitType::try_from(model.split_type.as_str())?;
                let stored = splits.remove(&model.id).unwrap_or_default();
                let resolved_amounts = resolve_amounts(model.amount, split_type, &stored);
                let split_values = match split_type {
                    SplitType::Equal => resolved_amounts.clone(),
                    SplitType::Shares | SplitType::Amounts => stored,
                };
                let participants = split_values
                    .keys()
                    .filter_map(|id| names.get(id).cloned())
                    .collect();
                Ok(Expense {
                    id: parse_uuid(&model.id, "expense")?,
                    group_id: model.group_id,
                    amount: model.amount,
                    currency: Currency::try_from(model.currency.as_str())?,
                    label: model.label,
                    kind: model.kind,
                    payer_id: model.payer_id,
                    split_type,
                    date: model.date,
                    image: model.image,
                    split_values,
                    resolved_amounts,
                    participants,
                })
            })
            .collect()
    }
}
