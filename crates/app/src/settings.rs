//! Settings for the `spleet` binary.
//!
//! Values come from an optional TOML file (`settings.toml` unless
//! `--config` says otherwise) layered under `SPLEET__*` environment
//! variables, e.g. `SPLEET__APP__LEVEL=debug`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_SETTINGS_PATH: &str = "settings";
const DEFAULT_SQLITE_PATH: &str = "spleet.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite(DEFAULT_SQLITE_PATH.to_string())
    }
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Self::Memory => String::from("sqlite::memory:"),
            Self::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

/// Webhook the notification transport posts to.
#[derive(Debug, Clone, Deserialize)]
pub struct Notifications {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub notifications: Option<Notifications>,
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or(DEFAULT_SETTINGS_PATH);
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("SPLEET").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(raw: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let settings = from_toml("");
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.database, Database::Sqlite("spleet.db".to_string()));
        assert!(settings.notifications.is_none());
    }

    #[test]
    fn full_file_is_read() {
        let settings = from_toml(
            r#"
            database = "memory"

            [app]
            level = "debug"

            [notifications]
            endpoint = "http://localhost:9000/push"
            "#,
        );
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.database, Database::Memory);
        let notifications = settings.notifications.unwrap();
        assert_eq!(notifications.endpoint, "http://localhost:9000/push");
        assert_eq!(notifications.timeout_secs, 10);
    }

    #[test]
    fn sqlite_path_becomes_url() {
        let settings = from_toml(r#"database = { sqlite = "/tmp/ledger.db" }"#);
        assert_eq!(settings.database.url(), "sqlite:/tmp/ledger.db?mode=rwc");
        assert_eq!(Database::Memory.url(), "sqlite::memory:");
    }
}
