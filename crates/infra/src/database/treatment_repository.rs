//! SQLite-backed implementation of the `TreatmentRepository` port.
//!
//! Instants are stored as epoch milliseconds. Active listings use the
//! same predicate the batch sweep uses, so a row can never be both
//! "expired" and "listed active" within one session start.
//!
//! All queries run on the blocking pool; rusqlite never touches an
//! async worker thread.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dosetrack_core::TreatmentRepository;
use dosetrack_domain::{DoseTrackError, Result, Treatment, TreatmentKind};
use rusqlite::{Row, ToSql};
use tokio::task;
use uuid::Uuid;

use super::instant_from_millis;
use super::manager::{map_join_error, map_sql_error, DbManager};

/// SQLite repository for treatments.
pub struct SqliteTreatmentRepository {
    db: Arc<DbManager>,
}

impl SqliteTreatmentRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

const TREATMENT_COLUMNS: &str = "id, user_id, name, kind, instructions, frequency_hours,
        next_scheduled_time, start_date, active, duration_days, end_date";

const TREATMENT_INSERT_SQL: &str = "INSERT INTO treatments (
        id, user_id, name, kind, instructions, frequency_hours,
        next_scheduled_time, start_date, active, duration_days, end_date, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

const TREATMENT_UPDATE_SQL: &str = "UPDATE treatments SET
        user_id = ?2, name = ?3, kind = ?4, instructions = ?5, frequency_hours = ?6,
        next_scheduled_time = ?7, start_date = ?8, active = ?9, duration_days = ?10,
        end_date = ?11
    WHERE id = ?1";

const TREATMENT_DEACTIVATE_EXPIRED_SQL: &str =
    "UPDATE treatments SET active = 0 WHERE active = 1 AND end_date IS NOT NULL AND end_date <= ?1";

#[async_trait]
impl TreatmentRepository for SqliteTreatmentRepository {
    async fn insert(&self, treatment: &Treatment) -> Result<()> {
        let db = Arc::clone(&self.db);
        let treatment = treatment.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let id = treatment.id.to_string();
            let kind = treatment.kind.as_str();
            let params: [&dyn ToSql; 12] = [
                &id,
                &treatment.user_id,
                &treatment.name,
                &kind,
                &treatment.instructions,
                &treatment.frequency_hours,
                &treatment.next_scheduled_time.timestamp_millis(),
                &treatment.start_date.timestamp_millis(),
                &treatment.active,
                &treatment.duration_days,
                &treatment.end_date.map(|d| d.timestamp_millis()),
                &Utc::now().timestamp_millis(),
            ];
            conn.execute(TREATMENT_INSERT_SQL, params.as_slice()).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, treatment: &Treatment) -> Result<()> {
        let db = Arc::clone(&self.db);
        let treatment = treatment.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let id = treatment.id.to_string();
            let kind = treatment.kind.as_str();
            let params: [&dyn ToSql; 11] = [
                &id,
                &treatment.user_id,
                &treatment.name,
                &kind,
                &treatment.instructions,
                &treatment.frequency_hours,
                &treatment.next_scheduled_time.timestamp_millis(),
                &treatment.start_date.timestamp_millis(),
                &treatment.active,
                &treatment.duration_days,
                &treatment.end_date.map(|d| d.timestamp_millis()),
            ];
            conn.execute(TREATMENT_UPDATE_SQL, params.as_slice()).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        next_scheduled_time: DateTime<Utc>,
        start_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            match start_date {
                Some(start) => {
                    conn.execute(
                        "UPDATE treatments SET next_scheduled_time = ?2, start_date = ?3 WHERE id = ?1",
                        rusqlite::params![
                            id.to_string(),
                            next_scheduled_time.timestamp_millis(),
                            start.timestamp_millis()
                        ],
                    )
                    .map_err(map_sql_error)?;
                }
                None => {
                    conn.execute(
                        "UPDATE treatments SET next_scheduled_time = ?2 WHERE id = ?1",
                        rusqlite::params![id.to_string(), next_scheduled_time.timestamp_millis()],
                    )
                    .map_err(map_sql_error)?;
                }
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE treatments SET active = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), active],
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
            conn.execute("DELETE FROM treatments WHERE id = ?1", rusqlite::params![id.to_string()])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Treatment>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<Treatment>> {
            let conn = db.get_connection()?;
            let sql = format!("SELECT {TREATMENT_COLUMNS} FROM treatments WHERE id = ?1");
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(rusqlite::params![id.to_string()], map_treatment_row)
                .map_err(map_sql_error)?;
            match rows.next() {
                Some(row) => Ok(Some(row.map_err(map_sql_error)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Treatment>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<Treatment>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {TREATMENT_COLUMNS} FROM treatments
                 WHERE active = 1 AND (end_date IS NULL OR end_date > ?1)
                 ORDER BY next_scheduled_time"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(rusqlite::params![now.timestamp_millis()], map_treatment_row)
                .map_err(map_sql_error)?;

            let mut treatments = Vec::new();
            for row in rows {
                treatments.push(row.map_err(map_sql_error)?);
            }
            Ok(treatments)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            conn.execute(
                TREATMENT_DEACTIVATE_EXPIRED_SQL,
                rusqlite::params![now.timestamp_millis()],
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_treatment_row(row: &Row<'_>) -> rusqlite::Result<Treatment> {
    let id: String = row.get(0)?;
    let kind: String = row.get(3)?;
    let next_ms: i64 = row.get(6)?;
    let start_ms: i64 = row.get(7)?;
    let end_ms: Option<i64> = row.get(10)?;

    Ok(Treatment {
        id: parse_uuid(&id, 0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind: parse_kind(&kind, 3)?,
        instructions: row.get(4)?,
        frequency_hours: row.get(5)?,
        next_scheduled_time: parse_instant(next_ms, 6)?,
        start_date: parse_instant(start_ms, 7)?,
        active: row.get(8)?,
        duration_days: row.get(9)?,
        end_date: end_ms.map(|ms| parse_instant(ms, 10)).transpose()?,
    })
}

pub(crate) fn parse_uuid(value: &str, column: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

pub(crate) fn parse_kind(value: &str, column: usize) -> rusqlite::Result<TreatmentKind> {
    match value {
        "medication" => Ok(TreatmentKind::Medication),
        "cure" => Ok(TreatmentKind::Cure),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(DoseTrackError::Database(format!("unknown treatment kind: {other}"))),
        )),
    }
}

pub(crate) fn parse_instant(ms: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    instant_from_millis(ms).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Integer,
            Box::new(err),
        )
    })
}
