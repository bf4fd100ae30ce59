//! Keyed settings rows, values JSON-encoded.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dosetrack_core::{ScheduledAlertSnapshot, SettingsRepository};
use dosetrack_domain::{DoseTrackError, NotificationConfig, Result};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

fn map_json_error(err: serde_json::Error) -> DoseTrackError {
    DoseTrackError::Database(format!("settings row corrupted: {err}"))
}

const NOTIFICATION_CONFIG_KEY: &str = "notification_config";
const ALERT_SNAPSHOT_KEY: &str = "alert_snapshot";

const SETTINGS_UPSERT_SQL: &str = "INSERT INTO settings (key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// SQLite repository for local settings.
pub struct SqliteSettingsRepository {
    db: Arc<DbManager>,
}

impl SqliteSettingsRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn load_value(db: &DbManager, key: &str) -> Result<Option<String>> {
        let conn = db.get_connection()?;
        let mut stmt = conn
            .prepare("SELECT value FROM settings WHERE key = ?1")
            .map_err(map_sql_error)?;
        let mut rows = stmt
            .query_map(rusqlite::params![key], |row| row.get::<_, String>(0))
            .map_err(map_sql_error)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(map_sql_error)?)),
            None => Ok(None),
        }
    }

    fn store_value(db: &DbManager, key: &str, value: &str) -> Result<()> {
        let conn = db.get_connection()?;
        conn.execute(
            SETTINGS_UPSERT_SQL,
            rusqlite::params![key, value, Utc::now().timestamp_millis()],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn load_notification_config(&self) -> Result<Option<NotificationConfig>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<NotificationConfig>> {
            match Self::load_value(&db, NOTIFICATION_CONFIG_KEY)? {
                Some(json) => Ok(Some(serde_json::from_str(&json).map_err(map_json_error)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn store_notification_config(&self, config: NotificationConfig) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let json = serde_json::to_string(&config).map_err(map_json_error)?;
            Self::store_value(&db, NOTIFICATION_CONFIG_KEY, &json)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn store_alert_snapshot(&self, snapshot: &[ScheduledAlertSnapshot]) -> Result<()> {
        let db = Arc::clone(&self.db);
        let json = serde_json::to_string(snapshot).map_err(map_json_error)?;

        task::spawn_blocking(move || Self::store_value(&db, ALERT_SNAPSHOT_KEY, &json))
            .await
            .map_err(map_join_error)?
    }

    async fn load_alert_snapshot(&self) -> Result<Vec<ScheduledAlertSnapshot>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<ScheduledAlertSnapshot>> {
            match Self::load_value(&db, ALERT_SNAPSHOT_KEY)? {
                Some(json) => Ok(serde_json::from_str(&json).map_err(map_json_error)?),
                None => Ok(Vec::new()),
            }
        })
        .await
        .map_err(map_join_error)?
    }
}
