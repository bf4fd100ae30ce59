//! Common data types used throughout the application
//!
//! Instants are UTC `DateTime`s in memory and epoch milliseconds at the
//! storage and wire boundaries, matching the clients that consume the
//! JSON surface.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TIME_SHIFT_THRESHOLD_MINUTES;

/// Kind of recurring treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreatmentKind {
    Medication,
    Cure,
}

impl TreatmentKind {
    /// Stable string form used in storage and alert payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medication => "medication",
            Self::Cure => "cure",
        }
    }
}

/// A recurring dosing plan (medication or care routine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub kind: TreatmentKind,
    /// Free-text instructions, e.g. "500mg" or "clean with saline".
    pub instructions: Option<String>,
    /// Whole hours between doses. 0 means manual/one-shot.
    pub frequency_hours: i64,
    pub next_scheduled_time: DateTime<Utc>,
    /// Anchor of the recurring cycle. Re-anchored on large drift.
    pub start_date: DateTime<Utc>,
    pub active: bool,
    pub duration_days: Option<i64>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Treatment {
    /// Whether the treatment's end date has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end <= now)
    }

    /// Dose interval as a chrono duration. Zero for manual treatments.
    pub fn frequency(&self) -> Duration {
        Duration::hours(self.frequency_hours.max(0))
    }

    /// Whether this treatment recurs on a fixed interval.
    pub fn is_recurring(&self) -> bool {
        self.frequency_hours > 0
    }

    /// Derive the end date from a start date and an optional duration.
    pub fn end_date_for(
        start_date: DateTime<Utc>,
        duration_days: Option<i64>,
    ) -> Option<DateTime<Utc>> {
        duration_days.filter(|days| *days > 0).map(|days| start_date + Duration::days(days))
    }
}

/// Outcome of one confirmed dose occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Taken,
    Skipped,
}

impl DoseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Taken => "taken",
            Self::Skipped => "skipped",
        }
    }
}

/// User intent when confirming a due dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseAction {
    Take,
    Skip,
}

impl DoseAction {
    /// History status recorded for this action.
    pub fn status(self) -> DoseStatus {
        match self {
            Self::Take => DoseStatus::Taken,
            Self::Skip => DoseStatus::Skipped,
        }
    }
}

/// Append-only adherence record.
///
/// The treatment name is denormalized so history survives treatment
/// deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub treatment_id: Uuid,
    pub treatment_name: String,
    pub user_id: String,
    /// When the action was recorded.
    pub recorded_at: DateTime<Utc>,
    /// When the user reports actually taking (or skipping) the dose.
    pub actual_time: DateTime<Utc>,
    pub status: DoseStatus,
    pub kind: TreatmentKind,
}

impl HistoryEntry {
    /// Entries are editable only within 24 hours of the reported dose
    /// time; afterwards the log is append-only.
    pub fn is_editable_at(&self, now: DateTime<Utc>) -> bool {
        now - self.actual_time <= Duration::hours(24)
    }
}

/// Candidate extracted from a scanned label or prescription image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedMedication {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub frequency_hours: i64,
}

/// Global alert configuration, persisted locally and read at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    /// Lead time between an alert and the dose it warns about.
    pub advance_minutes: i64,
    pub enabled: bool,
}

impl NotificationConfig {
    /// Clamp advance minutes to the supported 0..=60 range.
    pub fn clamped(self) -> Self {
        Self { advance_minutes: self.advance_minutes.clamp(0, 60), enabled: self.enabled }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { advance_minutes: 15, enabled: true }
    }
}

/// Drift between a planned dose time and the user-reported actual time.
///
/// A shift beyond the threshold re-anchors the recurring cycle to real
/// behaviour instead of letting it run out of phase.
pub fn exceeds_time_shift_threshold(scheduled: DateTime<Utc>, actual: DateTime<Utc>) -> bool {
    let drift = (actual - scheduled).abs();
    drift > Duration::minutes(TIME_SHIFT_THRESHOLD_MINUTES)
}
