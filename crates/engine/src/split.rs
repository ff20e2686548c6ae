//! Split allocation.
//!
//! Turns an expense amount plus a [`SplitType`] into one value per
//! participant. Pure functions only, nothing here touches the store.
//!
//! - `equal`: every participant gets `amount / n`, no remainder
//!   redistribution.
//! - `shares`: the provided share weights are kept verbatim; the currency
//!   amounts they stand for are obtained with [`resolve_amounts`].
//! - `amounts`: the provided currency amounts are kept verbatim, the caller
//!   owns their sum.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Per-participant values keyed by user id.
pub type SplitValues = BTreeMap<String, f64>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    #[default]
    Equal,
    Shares,
    Amounts,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Shares => "shares",
            Self::Amounts => "amounts",
        }
    }

    /// Whether the strategy needs a provided value per participant.
    pub fn needs_values(self) -> bool {
        !matches!(self, Self::Equal)
    }
}

impl core::fmt::Display for SplitType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SplitType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "equal" => Ok(Self::Equal),
            "shares" => Ok(Self::Shares),
            "amounts" => Ok(Self::Amounts),
            other => Err(EngineError::InvalidSplit(format!(
                "invalid split type: {other}"
            ))),
        }
    }
}

/// Allocate `amount` across `participants`.
///
/// For `shares`/`amounts` every participant must have an entry in `provided`;
/// entries for non-participants are ignored.
pub fn allocate(
    amount: f64,
    split_type: SplitType,
    participants: &[String],
    provided: Option<&HashMap<String, f64>>,
) -> ResultEngine<SplitValues> {
    if participants.is_empty() {
        return Err(EngineError::InvalidSplit(
            "at least one participant is required".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(participants.len());
    if let Some(dup) = participants.iter().find(|p| !seen.insert(p.as_str())) {
        return Err(EngineError::InvalidSplit(format!(
            "duplicate participant: {dup}"
        )));
    }

    match split_type {
        SplitType::Equal => {
            let share = amount / participants.len() as f64;
            Ok(participants.iter().map(|p| (p.clone(), share)).collect())
        }
        SplitType::Shares | SplitType::Amounts => {
            let provided = provided.ok_or_else(|| {
                EngineError::InvalidSplit(format!("{split_type} split requires split values"))
            })?;
            let mut out = SplitValues::new();
            for participant in participants {
                let value = *provided.get(participant).ok_or_else(|| {
                    EngineError::InvalidSplit(format!(
                        "missing split value for participant {participant}"
                    ))
                })?;
                if !value.is_finite() || value < 0.0 {
                    return Err(EngineError::InvalidSplit(format!(
                        "split value for {participant} must be a non-negative number"
                    )));
                }
                out.insert(participant.clone(), value);
            }
            if split_type == SplitType::Shares && out.values().sum::<f64>() <= 0.0 {
                return Err(EngineError::InvalidSplit(
                    "shares must not all be zero".to_string(),
                ));
            }
            Ok(out)
        }
    }
}

/// Currency amount owed by each participant for stored split values.
///
/// `equal` is recomputed from the participant count, `shares` are scaled so
/// that they sum to `amount`, `amounts` are returned as stored.
pub fn resolve_amounts(amount: f64, split_type: SplitType, values: &SplitValues) -> SplitValues {
    match split_type {
        SplitType::Equal => {
            let n = values.len().max(1) as f64;
            values.keys().map(|k| (k.clone(), amount / n)).collect()
        }
        SplitType::Shares => {
            let total: f64 = values.values().sum();
            if total <= 0.0 {
                return values.keys().map(|k| (k.clone(), 0.0)).collect();
            }
            values
                .iter()
                .map(|(k, share)| (k.clone(), amount * share / total))
                .collect()
        }
        SplitType::Amounts => values.clone(),
    }
}
