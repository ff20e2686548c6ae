//! The module contains the errors the engine can return.
//!
//! Every ledger operation either succeeds with a consistent result or fails
//! with exactly one of these kinds; partial mutations are never surfaced.
//!
//! - [`Validation`] malformed input (blank name, non-positive amount, ...).
//! - [`NotFound`] the referenced group, expense or user does not exist.
//! - [`NotMember`] the actor lacks the required membership.
//! - [`Conflict`] a concurrent mutation won the race; the caller should retry.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`NotMember`]: EngineError::NotMember
//!  [`Conflict`]: EngineError::Conflict
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Not a member: {0}")]
    NotMember(String),
    #[error("Already a member: {0}")]
    AlreadyMember(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Cooldown active: {0}")]
    Cooldown(String),
    #[error("No notification device: {0}")]
    NoDevice(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Notification failed: {0}")]
    Notification(String),
    #[error(transparent)]
    Database(DbErr),
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::Conflict(detail);
        }
        if is_busy(&err) {
            return Self::Conflict("store is busy, retry the operation".to_string());
        }
        Self::Database(err)
    }
}

/// SQLite reports lost write races as `SQLITE_BUSY`/`SQLITE_LOCKED`.
fn is_busy(err: &DbErr) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("database is locked") || message.contains("database table is locked")
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::NotMember(a), Self::NotMember(b)) => a == b,
            (Self::AlreadyMember(a), Self::AlreadyMember(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Cooldown(a), Self::Cooldown(b)) => a == b,
            (Self::NoDevice(a), Self::NoDevice(b)) => a == b,
            (Self::InvalidSplit(a), Self::InvalidSplit(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Notification(a), Self::Notification(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
