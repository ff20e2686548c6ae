//! Command structs for engine operations.
//!
//! These types group parameters for write operations (add/update expense,
//! reminders), keeping call sites readable and avoiding long argument lists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, SplitType};

/// Participants of a split plus the values the strategy needs.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitSpec {
    pub participants: Vec<String>,
    /// Required for `shares`/`amounts`, ignored for `equal`.
    pub values: Option<HashMap<String, f64>>,
}

impl SplitSpec {
    #[must_use]
    pub fn participants<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            participants: participants.into_iter().map(Into::into).collect(),
            values: None,
        }
    }

    /// Participants taken from `values`, in iteration order.
    #[must_use]
    pub fn with_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut participants = Vec::new();
        let mut map = HashMap::new();
        for (user_id, value) in values {
            let user_id = user_id.into();
            participants.push(user_id.clone());
            map.insert(user_id, value);
        }
        Self {
            participants,
            values: Some(map),
        }
    }
}

/// Add an expense to a group, paid by `payer_id`.
#[derive(Clone, Debug)]
pub struct AddExpenseCmd {
    pub group_id: String,
    pub payer_id: String,
    pub amount: f64,
    pub currency: Currency,
    pub label: String,
    pub kind: String,
    pub split_type: SplitType,
    pub date: DateTime<Utc>,
    pub split: SplitSpec,
    pub image: Option<String>,
}

impl AddExpenseCmd {
    /// Equal split over the payer alone until a split is supplied.
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        payer_id: impl Into<String>,
        amount: f64,
        label: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        let payer_id = payer_id.into();
        Self {
            group_id: group_id.into(),
            split: SplitSpec::participants([payer_id.clone()]),
            payer_id,
            amount,
            currency: Currency::default(),
            label: label.into(),
            kind: "other".to_string(),
            split_type: SplitType::Equal,
            date,
            image: None,
        }
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    #[must_use]
    pub fn split(mut self, split_type: SplitType, split: SplitSpec) -> Self {
        self.split_type = split_type;
        self.split = split;
        self
    }

    #[must_use]
    pub fn equal<I, S>(self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.split(SplitType::Equal, SplitSpec::participants(participants))
    }

    #[must_use]
    pub fn shares<I, S>(self, shares: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.split(SplitType::Shares, SplitSpec::with_values(shares))
    }

    #[must_use]
    pub fn amounts<I, S>(self, amounts: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.split(SplitType::Amounts, SplitSpec::with_values(amounts))
    }
}

/// Partially update an expense. Only supplied fields change.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub group_id: String,
    pub expense_id: Uuid,
    pub user_id: String,

    pub amount: Option<f64>,
    pub currency: Option<Currency>,
    pub label: Option<String>,
    pub kind: Option<String>,
    pub split_type: Option<SplitType>,
    pub date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the image reference.
    pub image: Option<Option<String>>,
    /// Replaces the whole split set when present.
    pub split: Option<SplitSpec>,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(group_id: impl Into<String>, expense_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            expense_id,
            user_id: user_id.into(),
            amount: None,
            currency: None,
            label: None,
            kind: None,
            split_type: None,
            date: None,
            image: None,
            split: None,
        }
    }

    #[must_use]
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn split_type(mut self, split_type: SplitType) -> Self {
        self.split_type = Some(split_type);
        self
    }

    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn image(mut self, image: Option<String>) -> Self {
        self.image = Some(image);
        self
    }

    /// Replace participants and values in one step.
    #[must_use]
    pub fn split(mut self, split_type: SplitType, split: SplitSpec) -> Self {
        self.split_type = Some(split_type);
        self.split = Some(split);
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.currency.is_none()
            && self.label.is_none()
            && self.kind.is_none()
            && self.split_type.is_none()
            && self.date.is_none()
            && self.image.is_none()
            && self.split.is_none()
    }
}

/// One line of a debt reminder: how much the debtor owes to a creditor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmountOwed {
    pub creditor: String,
    pub amount: f64,
}

impl AmountOwed {
    #[must_use]
    pub fn new(creditor: impl Into<String>, amount: f64) -> Self {
        Self {
            creditor: creditor.into(),
            amount,
        }
    }
}

/// Send a debt reminder from `sender_id` to `debtor_id`.
#[derive(Clone, Debug)]
pub struct ReminderCmd {
    pub group_id: String,
    pub sender_id: String,
    pub debtor_id: String,
    pub amounts_owed: Vec<AmountOwed>,
    /// Instant the cooldown is evaluated at and recorded as.
    pub now: DateTime<Utc>,
}

impl ReminderCmd {
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        sender_id: impl Into<String>,
        debtor_id: impl Into<String>,
        amounts_owed: Vec<AmountOwed>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            sender_id: sender_id.into(),
            debtor_id: debtor_id.into(),
            amounts_owed,
            now: Utc::now(),
        }
    }

    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}
