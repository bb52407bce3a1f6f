use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLOT: &str = "reminders";
pub const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 10; // unanswered notifications count as dismissed

/// Top-level config (nudge.toml + NUDGE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Key of the slot holding the reminder list.
    #[serde(default = "default_slot")]
    pub slot: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            slot: default_slot(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// How long a fired reminder waits for an answer before it is dismissed.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nudge/nudge.db", home)
}

impl NudgeConfig {
    /// Load config from a TOML file with NUDGE_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `NUDGE_NOTIFICATIONS__TIMEOUT_SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::NudgeError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("NUDGE_").split("__"))
    }
}

/// `NUDGE_CONFIG` if set, else `~/.nudge/nudge.toml`.
fn default_config_path() -> String {
    if let Ok(path) = std::env::var("NUDGE_CONFIG") {
        return path;
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nudge/nudge.toml", home)
}
