//! Port interfaces for persistence
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use chrono::{DateTime, Utc};
use dosetrack_domain::{
    DoseStatus, HistoryEntry, NotificationConfig, Result, Treatment,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use async_trait::async_trait;

/// Trait for persisting treatments.
#[async_trait]
pub trait TreatmentRepository: Send + Sync {
    /// Insert a new treatment.
    async fn insert(&self, treatment: &Treatment) -> Result<()>;

    /// Update every column of an existing treatment.
    async fn update(&self, treatment: &Treatment) -> Result<()>;

    /// Update only the schedule columns after a confirmed dose.
    /// `start_date` is written only when a time-shift re-anchored it.
    async fn update_schedule(
        &self,
        id: Uuid,
        next_scheduled_time: DateTime<Utc>,
        start_date: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Flip the active flag.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<()>;

    /// Hard delete (explicit user purge only).
    async fn delete(&self, id: Uuid) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Treatment>>;

    /// Active treatments whose end date is absent or in the future.
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Treatment>>;

    /// Batch-deactivate treatments whose end date has passed.
    /// Invoked on each session start. Returns the number of rows hit.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Trait for the append-mostly adherence log.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn insert(&self, entry: &HistoryEntry) -> Result<()>;

    /// Edit in place (no versioning). Callers enforce the 24h window.
    async fn update_entry(
        &self,
        id: Uuid,
        actual_time: DateTime<Utc>,
        status: DoseStatus,
    ) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HistoryEntry>>;

    /// Most recent entries, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>>;
}

/// One armed alert, as persisted for diagnostics and recovery. The
/// timers themselves are runtime-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledAlertSnapshot {
    pub treatment_id: Uuid,
    /// When the *alert* fires, i.e. the dose time minus the advance.
    pub alert_at: DateTime<Utc>,
}

/// Trait for locally persisted settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load_notification_config(&self) -> Result<Option<NotificationConfig>>;

    async fn store_notification_config(&self, config: NotificationConfig) -> Result<()>;

    /// Persist the current set of armed alerts. Best effort; the
    /// scheduler recomputes everything on restore anyway.
    async fn store_alert_snapshot(&self, snapshot: &[ScheduledAlertSnapshot]) -> Result<()>;

    async fn load_alert_snapshot(&self) -> Result<Vec<ScheduledAlertSnapshot>>;
}
