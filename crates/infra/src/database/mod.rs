//! Database implementations

pub mod history_repository;
pub mod manager;
pub mod settings_repository;
pub mod treatment_repository;

use chrono::{DateTime, TimeZone, Utc};
use dosetrack_domain::{DoseTrackError, Result};

pub use history_repository::SqliteHistoryRepository;
pub use manager::DbManager;
pub use settings_repository::SqliteSettingsRepository;
pub use treatment_repository::SqliteTreatmentRepository;

/// Decode an epoch-milliseconds column into a UTC instant.
pub(crate) fn instant_from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| DoseTrackError::Database(format!("timestamp out of range: {ms}")))
}
