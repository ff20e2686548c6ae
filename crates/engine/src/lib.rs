//! Shared-expense ledger.
//!
//! Users form groups, record expenses split among members, follow a group
//! activity log and nudge each other about debts. All state lives in a
//! SeaORM store; every mutating [`Engine`] operation runs in one database
//! transaction.
//!
//! Identity is external: callers pass already authenticated user ids.

pub use activity::{ActivityContext, ActivityEntry, ActivityKind};
pub use commands::{AddExpenseCmd, AmountOwed, ReminderCmd, SplitSpec, UpdateExpenseCmd};
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::{Expense, ExpenseOrder};
pub use groups::{Group, LeaveOutcome, Member};
pub use notify::{Destination, LogNotifier, Notification, Notifier, NotifyError};
pub use ops::{Engine, EngineBuilder, REMINDER_COOLDOWN_MS, ReminderReceipt, compose_reminder};
pub use split::{SplitType, SplitValues, allocate, resolve_amounts};
pub use users::{User, UserRef};

mod activity;
mod commands;
mod currency;
mod error;
mod expense_splits;
mod expenses;
mod group_members;
mod groups;
mod notify;
mod ops;
mod split;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
