//! Treatment CRUD orchestration.
//!
//! Applies every mutation to the in-memory store first and persists
//! through the repository ports. Validation lives here so both the
//! HTTP surface and future callers share it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dosetrack_domain::constants::HISTORY_EDIT_WINDOW_HOURS;
use dosetrack_domain::{
    DoseStatus, DoseTrackError, HistoryEntry, Result, Treatment, TreatmentKind,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::ports::{HistoryRepository, TreatmentRepository};
use crate::store::TreatmentStore;

/// Payload for creating a treatment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTreatment {
    pub name: String,
    pub kind: TreatmentKind,
    #[serde(default)]
    pub instructions: Option<String>,
    pub frequency_hours: i64,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub duration_days: Option<i64>,
}

/// Payload for editing a treatment. Full replacement of the editable
/// fields; the schedule columns are recomputed from the new values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTreatment {
    pub name: String,
    pub kind: TreatmentKind,
    #[serde(default)]
    pub instructions: Option<String>,
    pub frequency_hours: i64,
    pub start_date: DateTime<Utc>,
    pub next_scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_days: Option<i64>,
    pub active: bool,
}

/// Treatment lifecycle service.
pub struct TreatmentService {
    store: Arc<TreatmentStore>,
    treatments: Arc<dyn TreatmentRepository>,
    history: Arc<dyn HistoryRepository>,
    user_id: String,
}

impl TreatmentService {
    pub fn new(
        store: Arc<TreatmentStore>,
        treatments: Arc<dyn TreatmentRepository>,
        history: Arc<dyn HistoryRepository>,
        user_id: impl Into<String>,
    ) -> Self {
        Self { store, treatments, history, user_id: user_id.into() }
    }

    /// Session-start load: sweep expired treatments server-side, then
    /// mirror the active list into the store.
    #[instrument(skip(self))]
    pub async fn load_session(&self, now: DateTime<Utc>) -> Result<Vec<Treatment>> {
        let swept = self.treatments.deactivate_expired(now).await?;
        if swept > 0 {
            info!(count = swept, "deactivated expired treatments");
        }

        let active = self.treatments.list_active(now).await?;
        self.store.replace_all(active.clone());
        Ok(active)
    }

    /// Create a treatment. The first dose is the start date itself.
    pub async fn create(&self, new: NewTreatment) -> Result<Treatment> {
        validate_name(&new.name)?;
        validate_frequency(new.frequency_hours)?;

        let treatment = Treatment {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            name: new.name,
            kind: new.kind,
            instructions: new.instructions,
            frequency_hours: new.frequency_hours,
            next_scheduled_time: new.start_date,
            start_date: new.start_date,
            active: true,
            duration_days: new.duration_days,
            end_date: Treatment::end_date_for(new.start_date, new.duration_days),
        };

        self.treatments.insert(&treatment).await?;
        self.store.upsert(treatment.clone());
        info!(id = %treatment.id, name = %treatment.name, "treatment created");
        Ok(treatment)
    }

    /// Edit a treatment. A new end date in the past deactivates it.
    pub async fn update(&self, id: Uuid, update: UpdateTreatment) -> Result<Treatment> {
        validate_name(&update.name)?;
        validate_frequency(update.frequency_hours)?;

        let existing = self.require(id).await?;
        let end_date = Treatment::end_date_for(update.start_date, update.duration_days);
        let expired = end_date.is_some_and(|end| end <= Utc::now());

        let treatment = Treatment {
            id,
            user_id: existing.user_id,
            name: update.name,
            kind: update.kind,
            instructions: update.instructions,
            frequency_hours: update.frequency_hours,
            next_scheduled_time: update.next_scheduled_time,
            start_date: update.start_date,
            active: update.active && !expired,
            duration_days: update.duration_days,
            end_date,
        };

        // Optimistic: the mirror is updated before persistence resolves.
        self.store.upsert(treatment.clone());
        self.treatments.update(&treatment).await?;
        Ok(treatment)
    }

    /// Flip the active flag; history is preserved either way.
    pub async fn toggle_active(&self, id: Uuid) -> Result<Treatment> {
        let mut treatment = self.require(id).await?;
        treatment.active = !treatment.active;

        self.store.upsert(treatment.clone());
        self.treatments.set_active(id, treatment.active).await?;
        info!(id = %id, active = treatment.active, "treatment toggled");
        Ok(treatment)
    }

    /// Permanent delete. History rows survive via the denormalized
    /// treatment name.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.remove(id);
        self.treatments.delete(id).await?;
        info!(id = %id, "treatment permanently deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Treatment>> {
        if let Some(t) = self.store.get(id) {
            return Ok(Some(t));
        }
        self.treatments.find_by_id(id).await
    }

    pub async fn history_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.history.list_recent(limit).await
    }

    /// Edit a history entry; allowed only within the 24 h window from
    /// the reported dose time.
    pub async fn edit_history(
        &self,
        id: Uuid,
        actual_time: DateTime<Utc>,
        status: DoseStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = self
            .history
            .find_by_id(id)
            .await?
            .ok_or_else(|| DoseTrackError::NotFound(format!("history entry {id}")))?;

        if !entry.is_editable_at(now) {
            return Err(DoseTrackError::InvalidInput(format!(
                "history entries are editable only within {HISTORY_EDIT_WINDOW_HOURS} hours"
            )));
        }

        self.history.update_entry(id, actual_time, status).await
    }

    /// Delete a history entry; same 24 h window as edits.
    pub async fn delete_history(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let entry = self
            .history
            .find_by_id(id)
            .await?
            .ok_or_else(|| DoseTrackError::NotFound(format!("history entry {id}")))?;

        if !entry.is_editable_at(now) {
            return Err(DoseTrackError::InvalidInput(format!(
                "history entries are deletable only within {HISTORY_EDIT_WINDOW_HOURS} hours"
            )));
        }

        self.history.delete(id).await
    }

    async fn require(&self, id: Uuid) -> Result<Treatment> {
        match self.store.get(id) {
            Some(t) => Ok(t),
            None => self
                .treatments
                .find_by_id(id)
                .await?
                .ok_or_else(|| DoseTrackError::NotFound(format!("treatment {id}"))),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DoseTrackError::InvalidInput("treatment name must not be empty".into()));
    }
    Ok(())
}

fn validate_frequency(frequency_hours: i64) -> Result<()> {
    if frequency_hours < 0 {
        return Err(DoseTrackError::InvalidInput(
            "frequency must be zero (manual) or a positive number of hours".into(),
        ));
    }
    Ok(())
}
