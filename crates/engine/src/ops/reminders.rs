//! Debt reminders with a per-debtor cooldown.
//!
//! The cooldown is claimed in the same transaction that hands the message to
//! the notifier, so a failed delivery leaves it untouched.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveValue, IntoActiveModel, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    ActivityContext, ActivityKind, AmountOwed, Destination, EngineError, Notification,
    ReminderCmd, ResultEngine,
    util::format_amount,
};

use super::{Engine, with_tx};

/// Minimum delay between two reminders to the same member of a group.
pub const REMINDER_COOLDOWN_MS: i64 = 86_400_000;

/// A reminder that was accepted by the notifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderReceipt {
    pub notification: Notification,
    pub sent_at: DateTime<Utc>,
}

/// Message body for a list of debts, plus their total.
///
/// The creditor named is the one owed the most; on ties the first listed
/// wins.
pub fn compose_reminder(amounts_owed: &[AmountOwed]) -> ResultEngine<(String, f64)> {
    let Some(first) = amounts_owed.first() else {
        return Err(EngineError::Validation(
            "at least one amount owed is required".to_string(),
        ));
    };
    for owed in amounts_owed {
        if owed.creditor.trim().is_empty() {
            return Err(EngineError::Validation(
                "creditor must not be empty".to_string(),
            ));
        }
        if !owed.amount.is_finite() || owed.amount <= 0.0 {
            return Err(EngineError::Validation(format!(
                "amount owed to {} must be a positive number",
                owed.creditor.trim()
            )));
        }
    }

    let total: f64 = amounts_owed.iter().map(|owed| owed.amount).sum();
    let largest = amounts_owed
        .iter()
        .fold(first, |max, owed| if owed.amount > max.amount { owed } else { max });

    let creditor = largest.creditor.trim();
    let message = match amounts_owed.len() - 1 {
        0 => format!("You owe {} to {creditor}!", format_amount(total)),
        1 => format!("You owe {} to {creditor} and 1 other!", format_amount(total)),
        others => format!(
            "You owe {} to {creditor} and {others} others!",
            format_amount(total)
        ),
    };
    Ok((message, total))
}

impl Engine {
    /// Remind `cmd.debtor_id` of what they owe.
    ///
    /// Membership of both parties is checked first, then the cooldown, then
    /// the debtor's device, then the debts themselves. At most one reminder
    /// per debtor and group is accepted every [`REMINDER_COOLDOWN_MS`]; the
    /// cooldown is only consumed when the notifier accepts the message.
    pub async fn send_reminder(&self, cmd: ReminderCmd) -> ResultEngine<ReminderReceipt> {
        let now = cmd.now;

        let receipt = with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, &cmd.group_id).await?;
            self.require_member(&db_tx, &cmd.group_id, &cmd.sender_id)
                .await?;
            let membership = self
                .require_member(&db_tx, &cmd.group_id, &cmd.debtor_id)
                .await?;
            if cmd.sender_id == cmd.debtor_id {
                return Err(EngineError::Validation(
                    "cannot send a reminder to yourself".to_string(),
                ));
            }

            if let Some(last) = membership.last_notification_date
                && now - last < Duration::milliseconds(REMINDER_COOLDOWN_MS)
            {
                return Err(EngineError::Cooldown(format!(
                    "{} was already reminded at {last}",
                    cmd.debtor_id
                )));
            }

            let debtor = self.require_user(&db_tx, &cmd.debtor_id).await?;
            let Some(token) = debtor.device().map(ToString::to_string) else {
                return Err(EngineError::NoDevice(format!(
                    "{} has no registered device",
                    debtor.username
                )));
            };
            let (body, total) = compose_reminder(&cmd.amounts_owed)?;

            let mut active = membership.into_active_model();
            active.last_notification_date = ActiveValue::Set(Some(now));
            active.update(&db_tx).await?;

            self.record_activity(
                &db_tx,
                &cmd.group_id,
                ActivityKind::Reminder,
                &cmd.sender_id,
                &ActivityContext::reminder(debtor.username.clone(), total),
                now,
            )
            .await;

            let notification = Notification {
                title: group.name,
                body,
                destination: Destination::Single(token),
            };
            // Delivery failure rolls back the cooldown claim and the entry.
            if let Err(err) = self.notifier.send(&notification).await {
                warn!(group_id = %cmd.group_id, debtor_id = %cmd.debtor_id, "reminder not delivered: {err}");
                return Err(EngineError::Notification(err.to_string()));
            }

            Ok(ReminderReceipt {
                notification,
                sent_at: now,
            })
        })?;

        debug!(group_id = %cmd.group_id, debtor_id = %cmd.debtor_id, "reminder sent");
        Ok(receipt)
    }
}
