//! In-memory treatment store.
//!
//! Source of truth for scheduling decisions between full reloads.
//! Mutations are applied here optimistically before persistence
//! resolves; reconciliation happens on the next session load.

use std::collections::HashMap;

use dosetrack_domain::Treatment;
use parking_lot::RwLock;
use uuid::Uuid;

/// Thread-safe mirror of the treatment list.
#[derive(Default)]
pub struct TreatmentStore {
    treatments: RwLock<HashMap<Uuid, Treatment>>,
}

impl TreatmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole mirror, e.g. after a session-start fetch.
    pub fn replace_all(&self, treatments: Vec<Treatment>) {
        let mut guard = self.treatments.write();
        guard.clear();
        guard.extend(treatments.into_iter().map(|t| (t.id, t)));
    }

    /// Insert or update a single treatment.
    pub fn upsert(&self, treatment: Treatment) {
        self.treatments.write().insert(treatment.id, treatment);
    }

    /// Remove a treatment; idempotent.
    pub fn remove(&self, id: Uuid) -> Option<Treatment> {
        self.treatments.write().remove(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<Treatment> {
        self.treatments.read().get(&id).cloned()
    }

    /// Snapshot of active treatments ordered by next dose time.
    pub fn active_treatments(&self) -> Vec<Treatment> {
        let mut active: Vec<Treatment> =
            self.treatments.read().values().filter(|t| t.active).cloned().collect();
        active.sort_by_key(|t| t.next_scheduled_time);
        active
    }

    /// Snapshot of every known treatment, active or not.
    pub fn all(&self) -> Vec<Treatment> {
        self.treatments.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.treatments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.treatments.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use dosetrack_domain::TreatmentKind;

    use super::*;

    fn treatment(name: &str, active: bool, offset_hours: i64) -> Treatment {
        let now = Utc::now();
        Treatment {
            id: Uuid::new_v4(),
            user_id: "default".into(),
            name: name.into(),
            kind: TreatmentKind::Medication,
            instructions: None,
            frequency_hours: 8,
            next_scheduled_time: now + Duration::hours(offset_hours),
            start_date: now,
            active,
            duration_days: None,
            end_date: None,
        }
    }

    #[test]
    fn active_snapshot_is_sorted_by_next_dose() {
        let store = TreatmentStore::new();
        store.upsert(treatment("later", true, 8));
        store.upsert(treatment("sooner", true, 1));
        store.upsert(treatment("inactive", false, 0));

        let active = store.active_treatments();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].name, "sooner");
        assert_eq!(active[1].name, "later");
    }

    #[test]
    fn replace_all_drops_stale_entries() {
        let store = TreatmentStore::new();
        let stale = treatment("stale", true, 1);
        store.upsert(stale.clone());

        let fresh = treatment("fresh", true, 2);
        store.replace_all(vec![fresh.clone()]);

        assert!(store.get(stale.id).is_none());
        assert!(store.get(fresh.id).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = TreatmentStore::new();
        let t = treatment("once", true, 1);
        store.upsert(t.clone());

        assert!(store.remove(t.id).is_some());
        assert!(store.remove(t.id).is_none());
    }
}
