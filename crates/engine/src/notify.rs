//! Notification transport port.
//!
//! The engine hands structured messages to a [`Notifier`]; delivery and
//! retries are the transport's concern. Accepting the message is the only
//! thing the engine relies on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a notification should go.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Single(String),
    Many(Vec<String>),
}

impl Destination {
    pub fn tokens(&self) -> &[String] {
        match self {
            Self::Single(token) => std::slice::from_ref(token),
            Self::Many(tokens) => tokens,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub destination: Destination,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hand `notification` to the transport. `Ok` means it was accepted.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Transport that only logs what it is given.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.destination.tokens().is_empty() {
            return Err(NotifyError("no destination token".to_string()));
        }
        tracing::info!(
            title = %notification.title,
            recipients = notification.destination.tokens().len(),
            "notification: {}",
            notification.body
        );
        Ok(())
    }
}
