//! Configuration structures for the application.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ADVANCE_MINUTES, DEFAULT_DUE_CHECK_INTERVAL_SECS};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "dosetrack.db".into(), pool_size: 4 }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Owner recorded on rows. Auth is an external concern; a single
    /// local profile is the deployment model.
    pub user_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1:7420".into(), user_id: "default".into() }
    }
}

/// Startup defaults for the reminder scheduler and due-check loop.
///
/// The advance-minutes value here seeds the settings table on first
/// run; afterwards the persisted value wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub advance_minutes: i64,
    pub enabled: bool,
    pub due_check_interval_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            advance_minutes: DEFAULT_ADVANCE_MINUTES,
            enabled: true,
            due_check_interval_secs: DEFAULT_DUE_CHECK_INTERVAL_SECS,
        }
    }
}

/// Remote label-scan endpoint settings.
///
/// A missing API key degrades scanning to "zero candidates"; it never
/// blocks startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { api_key: None, endpoint: None, model: "gemini-2.0-flash".into() }
    }
}
