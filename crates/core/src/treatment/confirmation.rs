//! Dose confirmation handler.
//!
//! Recomputes the cycle after a take or skip, detects schedule drift,
//! appends the history entry, and applies everything optimistically:
//! the in-memory store is updated before persistence resolves, and a
//! persistence failure keeps the optimistic state (reconciled on the
//! next session load) rather than rolling back.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use dosetrack_domain::{DoseAction, HistoryEntry, Result, Treatment};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::ports::{HistoryRepository, TreatmentRepository};
use crate::dosing;
use crate::store::TreatmentStore;

/// What a confirmation did, for the caller to act on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationOutcome {
    /// False when the treatment vanished concurrently (no-op).
    pub applied: bool,
    /// Large drift re-anchored the cycle; exported calendars are stale.
    pub time_shift: bool,
    /// Every remaining dose of the calendar day is accounted for.
    pub day_complete: bool,
    /// Persistence failed; local state was kept without rollback.
    pub sync_warning: bool,
    /// The treatment after the recompute, for rescheduling timers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<Treatment>,
}

impl ConfirmationOutcome {
    fn noop() -> Self {
        Self {
            applied: false,
            time_shift: false,
            day_complete: false,
            sync_warning: false,
            treatment: None,
        }
    }
}

/// Applies take/skip confirmations to the store and repositories.
pub struct ConfirmationService {
    store: Arc<TreatmentStore>,
    treatments: Arc<dyn TreatmentRepository>,
    history: Arc<dyn HistoryRepository>,
}

impl ConfirmationService {
    pub fn new(
        store: Arc<TreatmentStore>,
        treatments: Arc<dyn TreatmentRepository>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self { store, treatments, history }
    }

    /// Confirm one dose occurrence.
    ///
    /// `actual_time` is the user-reported instant, which may be
    /// backdated from a picker rather than "now".
    pub async fn confirm(
        &self,
        treatment_id: Uuid,
        action: DoseAction,
        actual_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ConfirmationOutcome> {
        // The treatment may have been deleted concurrently; a stale
        // confirmation is a no-op, not an error.
        let Some(mut treatment) = self.store.get(treatment_id) else {
            info!(id = %treatment_id, "confirmation for unknown treatment ignored");
            return Ok(ConfirmationOutcome::noop());
        };

        let previous_next = treatment.next_scheduled_time;
        let mut time_shift = false;

        match action {
            DoseAction::Take => {
                treatment.next_scheduled_time =
                    dosing::next_after_take(actual_time, treatment.frequency_hours);
                time_shift = dosing::detect_time_shift(
                    previous_next,
                    actual_time,
                    treatment.frequency_hours,
                );
                if time_shift {
                    // Re-anchor the whole future cycle to real behaviour.
                    treatment.start_date = actual_time;
                }
            }
            DoseAction::Skip => {
                // The slot is forfeited; the cycle keeps its phase and
                // the skip time is deliberately ignored.
                treatment.next_scheduled_time =
                    dosing::next_after_skip(previous_next, treatment.frequency_hours);
            }
        }

        // Optimistic apply before any persistence call resolves.
        self.store.upsert(treatment.clone());

        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            treatment_id,
            treatment_name: treatment.name.clone(),
            user_id: treatment.user_id.clone(),
            recorded_at: now,
            actual_time,
            status: action.status(),
            kind: treatment.kind,
        };

        let mut sync_warning = false;

        let start_date = time_shift.then_some(treatment.start_date);
        if let Err(err) = self
            .treatments
            .update_schedule(treatment_id, treatment.next_scheduled_time, start_date)
            .await
        {
            warn!(id = %treatment_id, error = %err, "failed to persist recomputed schedule");
            sync_warning = true;
        }

        if let Err(err) = self.history.insert(&entry).await {
            warn!(id = %treatment_id, error = %err, "failed to persist history entry");
            sync_warning = true;
        }

        let day_complete =
            action == DoseAction::Take && self.remaining_doses_today(treatment_id, now) == 0;

        info!(
            id = %treatment_id,
            action = ?action,
            time_shift,
            day_complete,
            next = %treatment.next_scheduled_time,
            "dose confirmed"
        );

        Ok(ConfirmationOutcome {
            applied: true,
            time_shift,
            day_complete,
            sync_warning,
            treatment: Some(treatment),
        })
    }

    /// Count other active treatments with a dose still due between now
    /// and the end of the calendar day.
    fn remaining_doses_today(&self, confirmed_id: Uuid, now: DateTime<Utc>) -> usize {
        let end_of_day = now
            .with_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
            .single()
            .unwrap_or(now);

        self.store
            .active_treatments()
            .iter()
            .filter(|t| {
                t.id != confirmed_id
                    && t.next_scheduled_time > now
                    && t.next_scheduled_time < end_of_day
            })
            .count()
    }
}
