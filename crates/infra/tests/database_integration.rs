//! End-to-end database coverage for the SQLite repositories.
//!
//! Each test runs against an isolated on-disk database with the full
//! schema applied, exercising the repository workflows the services
//! depend on: treatment lifecycle, schedule updates, the expiry sweep,
//! dose history, and persisted settings.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use dosetrack_core::{
    HistoryRepository, ScheduledAlertSnapshot, SettingsRepository, TreatmentRepository,
};
use dosetrack_domain::{
    DoseStatus, HistoryEntry, NotificationConfig, Treatment, TreatmentKind,
};
use dosetrack_infra::database::{
    DbManager, SqliteHistoryRepository, SqliteSettingsRepository, SqliteTreatmentRepository,
};
use tempfile::TempDir;
use uuid::Uuid;

struct DbHarness {
    #[allow(dead_code)]
    temp_dir: TempDir,
    manager: Arc<DbManager>,
}

impl DbHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("temporary directory should be created");
        let db_path = temp_dir.path().join("dosetrack-integration.db");

        let manager =
            Arc::new(DbManager::new(&db_path, 4).expect("database manager should initialise"));
        manager.run_migrations().expect("schema migrations should apply");

        Self { temp_dir, manager }
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).single().expect("base timestamp should be valid")
}

fn make_treatment(name: &str, next: DateTime<Utc>) -> Treatment {
    Treatment {
        id: Uuid::new_v4(),
        user_id: "default".to_string(),
        name: name.to_string(),
        kind: TreatmentKind::Medication,
        instructions: Some("with food".to_string()),
        frequency_hours: 8,
        next_scheduled_time: next,
        start_date: next,
        active: true,
        duration_days: None,
        end_date: None,
    }
}

fn make_history(treatment: &Treatment, actual: DateTime<Utc>, status: DoseStatus) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::new_v4(),
        treatment_id: treatment.id,
        treatment_name: treatment.name.clone(),
        user_id: treatment.user_id.clone(),
        recorded_at: actual,
        actual_time: actual,
        status,
        kind: treatment.kind,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn treatment_round_trip_preserves_all_fields() {
    let harness = DbHarness::new();
    let repo = SqliteTreatmentRepository::new(Arc::clone(&harness.manager));

    let mut treatment = make_treatment("Amoxicillin", base_time());
    treatment.duration_days = Some(7);
    treatment.end_date = Treatment::end_date_for(treatment.start_date, treatment.duration_days);

    repo.insert(&treatment).await.expect("insert should succeed");

    let loaded = repo
        .find_by_id(treatment.id)
        .await
        .expect("lookup should succeed")
        .expect("row should exist");

    assert_eq!(loaded.id, treatment.id);
    assert_eq!(loaded.name, "Amoxicillin");
    assert_eq!(loaded.kind, TreatmentKind::Medication);
    assert_eq!(loaded.instructions.as_deref(), Some("with food"));
    assert_eq!(loaded.frequency_hours, 8);
    assert_eq!(loaded.next_scheduled_time, treatment.next_scheduled_time);
    assert_eq!(loaded.start_date, treatment.start_date);
    assert_eq!(loaded.duration_days, Some(7));
    assert_eq!(loaded.end_date, treatment.end_date);
    assert!(loaded.active);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_treatment_returns_none() {
    let harness = DbHarness::new();
    let repo = SqliteTreatmentRepository::new(Arc::clone(&harness.manager));

    let found = repo.find_by_id(Uuid::new_v4()).await.expect("lookup should succeed");
    assert!(found.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn update_schedule_moves_next_and_optionally_start() {
    let harness = DbHarness::new();
    let repo = SqliteTreatmentRepository::new(Arc::clone(&harness.manager));

    let treatment = make_treatment("Ibuprofen", base_time());
    repo.insert(&treatment).await.expect("insert should succeed");

    // Plain confirmation: only next moves.
    let next = base_time() + ChronoDuration::hours(8);
    repo.update_schedule(treatment.id, next, None).await.expect("schedule update");
    let loaded = repo.find_by_id(treatment.id).await.expect("lookup").expect("row");
    assert_eq!(loaded.next_scheduled_time, next);
    assert_eq!(loaded.start_date, treatment.start_date);

    // Time-shift confirmation: the anchor moves as well.
    let actual = base_time() + ChronoDuration::hours(2);
    let shifted_next = actual + ChronoDuration::hours(8);
    repo.update_schedule(treatment.id, shifted_next, Some(actual))
        .await
        .expect("schedule update with re-anchor");
    let loaded = repo.find_by_id(treatment.id).await.expect("lookup").expect("row");
    assert_eq!(loaded.next_scheduled_time, shifted_next);
    assert_eq!(loaded.start_date, actual);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_active_excludes_inactive_and_ended() {
    let harness = DbHarness::new();
    let repo = SqliteTreatmentRepository::new(Arc::clone(&harness.manager));
    let now = base_time();

    let active = make_treatment("Active", now + ChronoDuration::hours(2));
    repo.insert(&active).await.expect("insert");

    let mut paused = make_treatment("Paused", now + ChronoDuration::hours(1));
    paused.active = false;
    repo.insert(&paused).await.expect("insert");

    let mut ended = make_treatment("Ended", now - ChronoDuration::days(2));
    ended.end_date = Some(now - ChronoDuration::days(1));
    repo.insert(&ended).await.expect("insert");

    let mut ongoing_cure = make_treatment("Cure", now + ChronoDuration::hours(3));
    ongoing_cure.kind = TreatmentKind::Cure;
    ongoing_cure.end_date = Some(now + ChronoDuration::days(3));
    repo.insert(&ongoing_cure).await.expect("insert");

    let listed = repo.list_active(now).await.expect("list");
    let names: Vec<&str> = listed.iter().map(|t| t.name.as_str()).collect();

    // Sorted by next dose time.
    assert_eq!(names, vec!["Active", "Cure"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn deactivate_expired_sweeps_only_ended_rows() {
    let harness = DbHarness::new();
    let repo = SqliteTreatmentRepository::new(Arc::clone(&harness.manager));
    let now = base_time();

    let mut expired_a = make_treatment("Expired A", now - ChronoDuration::days(3));
    expired_a.end_date = Some(now - ChronoDuration::days(1));
    repo.insert(&expired_a).await.expect("insert");

    let mut expired_b = make_treatment("Expired B", now - ChronoDuration::days(5));
    expired_b.end_date = Some(now - ChronoDuration::hours(1));
    repo.insert(&expired_b).await.expect("insert");

    let mut running = make_treatment("Running", now + ChronoDuration::hours(4));
    running.end_date = Some(now + ChronoDuration::days(2));
    repo.insert(&running).await.expect("insert");

    let open_ended = make_treatment("Open", now + ChronoDuration::hours(6));
    repo.insert(&open_ended).await.expect("insert");

    let swept = repo.deactivate_expired(now).await.expect("sweep");
    assert_eq!(swept, 2);

    // The sweep is idempotent.
    let swept_again = repo.deactivate_expired(now).await.expect("sweep again");
    assert_eq!(swept_again, 0);

    let listed = repo.list_active(now).await.expect("list");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|t| t.name == "Running" || t.name == "Open"));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_treatment() {
    let harness = DbHarness::new();
    let repo = SqliteTreatmentRepository::new(Arc::clone(&harness.manager));

    let treatment = make_treatment("Temp", base_time());
    repo.insert(&treatment).await.expect("insert");
    repo.delete(treatment.id).await.expect("delete");

    assert!(repo.find_by_id(treatment.id).await.expect("lookup").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn history_insert_list_edit_delete_workflow() {
    let harness = DbHarness::new();
    let treatments = SqliteTreatmentRepository::new(Arc::clone(&harness.manager));
    let history = SqliteHistoryRepository::new(Arc::clone(&harness.manager));

    let treatment = make_treatment("Paracetamol", base_time());
    treatments.insert(&treatment).await.expect("insert treatment");

    let first = make_history(&treatment, base_time(), DoseStatus::Taken);
    let second =
        make_history(&treatment, base_time() + ChronoDuration::hours(8), DoseStatus::Skipped);
    history.insert(&first).await.expect("insert first");
    history.insert(&second).await.expect("insert second");

    // Newest first.
    let recent = history.list_recent(10).await.expect("list");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id);
    assert_eq!(recent[0].status, DoseStatus::Skipped);
    assert_eq!(recent[1].id, first.id);

    // Limit is honoured.
    let limited = history.list_recent(1).await.expect("list limited");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, second.id);

    // Edit in place.
    let corrected_time = base_time() + ChronoDuration::minutes(30);
    history
        .update_entry(first.id, corrected_time, DoseStatus::Skipped)
        .await
        .expect("edit entry");
    let edited = history.find_by_id(first.id).await.expect("lookup").expect("row");
    assert_eq!(edited.actual_time, corrected_time);
    assert_eq!(edited.status, DoseStatus::Skipped);
    // Recorded-at is untouched by edits.
    assert_eq!(edited.recorded_at, first.recorded_at);

    history.delete(second.id).await.expect("delete entry");
    assert!(history.find_by_id(second.id).await.expect("lookup").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn notification_config_round_trip() {
    let harness = DbHarness::new();
    let settings = SqliteSettingsRepository::new(Arc::clone(&harness.manager));

    // Nothing persisted yet.
    assert!(settings.load_notification_config().await.expect("load").is_none());

    let config = NotificationConfig { advance_minutes: 30, enabled: false };
    settings.store_notification_config(config).await.expect("store");

    let loaded = settings.load_notification_config().await.expect("load").expect("config");
    assert_eq!(loaded.advance_minutes, 30);
    assert!(!loaded.enabled);

    // Upsert replaces the previous value.
    let replaced = NotificationConfig { advance_minutes: 5, enabled: true };
    settings.store_notification_config(replaced).await.expect("store again");
    let loaded = settings.load_notification_config().await.expect("load").expect("config");
    assert_eq!(loaded.advance_minutes, 5);
    assert!(loaded.enabled);
}

#[tokio::test(flavor = "multi_thread")]
async fn alert_snapshot_round_trip() {
    let harness = DbHarness::new();
    let settings = SqliteSettingsRepository::new(Arc::clone(&harness.manager));

    assert!(settings.load_alert_snapshot().await.expect("load").is_empty());

    let snapshot = vec![
        ScheduledAlertSnapshot { treatment_id: Uuid::new_v4(), alert_at: base_time() },
        ScheduledAlertSnapshot {
            treatment_id: Uuid::new_v4(),
            alert_at: base_time() + ChronoDuration::hours(8),
        },
    ];
    settings.store_alert_snapshot(&snapshot).await.expect("store");

    let loaded = settings.load_alert_snapshot().await.expect("load");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].treatment_id, snapshot[0].treatment_id);
    assert_eq!(loaded[1].alert_at, snapshot[1].alert_at);

    // An empty snapshot overwrites the previous one.
    settings.store_alert_snapshot(&[]).await.expect("store empty");
    assert!(settings.load_alert_snapshot().await.expect("load").is_empty());
}
