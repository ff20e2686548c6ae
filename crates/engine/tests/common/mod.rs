#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};

use engine::{Destination, Engine, Notification, Notifier, NotifyError, User};
use migration::MigratorTrait;

/// Notifier that keeps every accepted notification and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Notifications addressed to a single device (reminders).
    pub fn direct(&self) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| matches!(n.destination, Destination::Single(_)))
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("transport unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct Harness {
    pub engine: Engine,
    pub db: DatabaseConnection,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn engine_with_db() -> Harness {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Engine::builder()
        .database(db.clone())
        .notifier(notifier.clone())
        .build()
        .await
        .unwrap();
    Harness {
        engine,
        db,
        notifier,
    }
}

/// Create a user with a device token `device-{username}`.
pub async fn user(engine: &Engine, username: &str) -> User {
    engine
        .create_user(username, Some(&format!("device-{username}")))
        .await
        .unwrap()
}
