//! SQLite-backed implementation of the `HistoryRepository` port.
//!
//! Queries run on the blocking pool, same as the treatment
//! repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dosetrack_core::HistoryRepository;
use dosetrack_domain::{DoseStatus, DoseTrackError, HistoryEntry, Result};
use rusqlite::Row;
use tokio::task;
use uuid::Uuid;

use super::manager::{map_join_error, map_sql_error, DbManager};
use super::treatment_repository::{parse_instant, parse_kind, parse_uuid};

/// SQLite repository for the dose log.
pub struct SqliteHistoryRepository {
    db: Arc<DbManager>,
}

impl SqliteHistoryRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

const HISTORY_COLUMNS: &str =
    "id, treatment_id, treatment_name, user_id, recorded_at, actual_time, status, kind";

const HISTORY_INSERT_SQL: &str = "INSERT INTO history (
        id, treatment_id, treatment_name, user_id, recorded_at, actual_time, status, kind
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn insert(&self, entry: &HistoryEntry) -> Result<()> {
        let db = Arc::clone(&self.db);
        let entry = entry.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                HISTORY_INSERT_SQL,
                rusqlite::params![
                    entry.id.to_string(),
                    entry.treatment_id.to_string(),
                    entry.treatment_name,
                    entry.user_id,
                    entry.recorded_at.timestamp_millis(),
                    entry.actual_time.timestamp_millis(),
                    entry.status.as_str(),
                    entry.kind.as_str(),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_entry(
        &self,
        id: Uuid,
        actual_time: DateTime<Utc>,
        status: DoseStatus,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE history SET actual_time = ?2, status = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), actual_time.timestamp_millis(), status.as_str()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM history WHERE id = ?1", rusqlite::params![id.to_string()])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HistoryEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<HistoryEntry>> {
            let conn = db.get_connection()?;
            let sql = format!("SELECT {HISTORY_COLUMNS} FROM history WHERE id = ?1");
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(rusqlite::params![id.to_string()], map_history_row)
                .map_err(map_sql_error)?;
            match rows.next() {
                Some(row) => Ok(Some(row.map_err(map_sql_error)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<HistoryEntry>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {HISTORY_COLUMNS} FROM history ORDER BY recorded_at DESC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(rusqlite::params![limit as i64], map_history_row)
                .map_err(map_sql_error)?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(map_sql_error)?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_history_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let id: String = row.get(0)?;
    let treatment_id: String = row.get(1)?;
    let recorded_ms: i64 = row.get(4)?;
    let actual_ms: i64 = row.get(5)?;
    let status: String = row.get(6)?;
    let kind: String = row.get(7)?;

    Ok(HistoryEntry {
        id: parse_uuid(&id, 0)?,
        treatment_id: parse_uuid(&treatment_id, 1)?,
        treatment_name: row.get(2)?,
        user_id: row.get(3)?,
        recorded_at: parse_instant(recorded_ms, 4)?,
        actual_time: parse_instant(actual_ms, 5)?,
        status: parse_status(&status, 6)?,
        kind: parse_kind(&kind, 7)?,
    })
}

fn parse_status(value: &str, column: usize) -> rusqlite::Result<DoseStatus> {
    match value {
        "taken" => Ok(DoseStatus::Taken),
        "skipped" => Ok(DoseStatus::Skipped),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(DoseTrackError::Database(format!("unknown dose status: {other}"))),
        )),
    }
}
