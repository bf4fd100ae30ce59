//! Per-treatment reminder timers.
//!
//! At most one timer is armed per treatment. Arming replaces any
//! previous timer for the same treatment, so a schedule change never
//! leaves a stale alert behind. Doses missed while the process was not
//! running are never fired as a backlog; the dose time is rolled
//! forward to the next future occurrence before arming.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dosetrack_core::{dosing, ScheduledAlertSnapshot, SettingsRepository, TreatmentStore};
use dosetrack_domain::{NotificationConfig, Treatment};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::notify::{Alert, AlertDispatcher};
use crate::observability::{log_metric, PerformanceMetrics};

struct ArmedTimer {
    handle: JoinHandle<()>,
    alert_at: DateTime<Utc>,
    dose_at: DateTime<Utc>,
}

/// Arms one absolute timer per active treatment and dispatches the
/// alert when it fires.
pub struct ReminderScheduler {
    store: Arc<TreatmentStore>,
    settings: Arc<dyn SettingsRepository>,
    dispatcher: Arc<AlertDispatcher>,
    metrics: Arc<PerformanceMetrics>,
    config: RwLock<NotificationConfig>,
    timers: Mutex<HashMap<Uuid, ArmedTimer>>,
    shutdown: CancellationToken,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<TreatmentStore>,
        settings: Arc<dyn SettingsRepository>,
        dispatcher: Arc<AlertDispatcher>,
        metrics: Arc<PerformanceMetrics>,
        config: NotificationConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            settings,
            dispatcher,
            metrics,
            config: RwLock::new(config.clamped()),
            timers: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn notification_config(&self) -> NotificationConfig {
        *self.config.read()
    }

    /// Arm (or re-arm) the timer for one treatment. Inactive
    /// treatments and a disabled scheduler clear any existing timer
    /// instead.
    #[instrument(skip(self, treatment), fields(treatment_id = %treatment.id))]
    pub async fn schedule(self: &Arc<Self>, treatment: &Treatment) {
        if !self.config.read().enabled || !treatment.active {
            self.cancel(treatment.id);
            self.persist_snapshot().await;
            return;
        }

        let now = Utc::now();
        let advance = ChronoDuration::minutes(self.config.read().advance_minutes);
        let mut dose_at =
            dosing::fast_forward(treatment.next_scheduled_time, treatment.frequency_hours, now);

        // Timers are only armed for alert instants strictly in the
        // future. A dose whose alert offset has already passed rolls
        // to the next occurrence; the due-check loop covers the
        // in-flight one.
        if treatment.is_recurring() {
            while dose_at - advance <= now {
                dose_at = dose_at + treatment.frequency();
            }
        } else if dose_at - advance <= now {
            debug!(treatment_id = %treatment.id, "Alert offset already passed, not arming");
            self.cancel(treatment.id);
            self.persist_snapshot().await;
            return;
        }

        if let Some(end) = treatment.end_date {
            if dose_at > end {
                debug!(treatment_id = %treatment.id, "Series exhausted, not arming");
                self.cancel(treatment.id);
                self.persist_snapshot().await;
                return;
            }
        }

        self.arm(treatment.id, dose_at);
        self.persist_snapshot().await;
    }

    /// Arm a timer for a specific dose occurrence, replacing any timer
    /// already held for the treatment.
    fn arm(self: &Arc<Self>, treatment_id: Uuid, dose_at: DateTime<Utc>) {
        let advance = ChronoDuration::minutes(self.config.read().advance_minutes);
        let alert_at = dose_at - advance;
        let now = Utc::now();
        let Ok(delay) = (alert_at - now).to_std() else {
            debug!(treatment_id = %treatment_id, alert_at = %alert_at, "Alert instant not in the future, not arming");
            return;
        };

        let scheduler = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    scheduler.fire(treatment_id, dose_at).await;
                }
            }
        });

        debug!(treatment_id = %treatment_id, dose_at = %dose_at, alert_at = %alert_at, "Timer armed");
        log_metric(self.metrics.record_alert_scheduled(), "alerts.scheduled");

        let previous =
            self.timers.lock().insert(treatment_id, ArmedTimer { handle, alert_at, dose_at });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    /// Timer callback. Re-validates against the store before
    /// dispatching, so a timer armed for a schedule that has since
    /// changed fires into nothing.
    async fn fire(self: Arc<Self>, treatment_id: Uuid, dose_at: DateTime<Utc>) {
        self.timers.lock().remove(&treatment_id);

        if !self.config.read().enabled {
            return;
        }

        let Some(treatment) = self.store.get(treatment_id) else {
            debug!(treatment_id = %treatment_id, "Treatment gone, dropping alert");
            return;
        };
        if !treatment.active {
            return;
        }

        if !schedule_matches(&treatment, dose_at) {
            debug!(
                treatment_id = %treatment_id,
                armed = %dose_at,
                next = %treatment.next_scheduled_time,
                "Stale timer, dropping alert"
            );
            return;
        }

        log_metric(self.metrics.record_alert_fired(), "alerts.fired");
        let alert = Alert::for_treatment(&treatment, dose_at);
        if let Err(err) = self.dispatcher.dispatch(&alert).await {
            warn!(treatment_id = %treatment_id, error = %err, "Alert dispatch failed");
        }

        // Re-arm for the following occurrence in case the dose is
        // never confirmed. Confirmation replaces this timer anyway.
        if treatment.is_recurring() {
            let follow = dose_at + treatment.frequency();
            let exhausted = treatment.end_date.map(|end| follow > end).unwrap_or(false);
            if !exhausted {
                self.arm(treatment_id, follow);
            }
        }
        self.persist_snapshot().await;
    }

    /// Drop the timer for one treatment, if armed.
    pub fn cancel(&self, treatment_id: Uuid) {
        if let Some(timer) = self.timers.lock().remove(&treatment_id) {
            timer.handle.abort();
            log_metric(self.metrics.record_alert_cancelled(), "alerts.cancelled");
        }
    }

    pub fn cancel_all(&self) {
        let mut timers = self.timers.lock();
        for (_, timer) in timers.drain() {
            timer.handle.abort();
            log_metric(self.metrics.record_alert_cancelled(), "alerts.cancelled");
        }
    }

    /// Arm timers for every active treatment in the store. Called at
    /// session start and after settings changes.
    #[instrument(skip(self))]
    pub async fn restore_all(self: &Arc<Self>) {
        self.cancel_all();
        let treatments = self.store.active_treatments();
        let count = treatments.len();
        for treatment in &treatments {
            self.schedule(treatment).await;
        }
        info!(count = count, "Reminder timers restored");
    }

    /// Change the advance notice. The value is clamped to a sane
    /// range and persisted; armed timers keep their old offset until
    /// the caller runs [`restore_all`](Self::restore_all).
    pub async fn set_advance_minutes(self: &Arc<Self>, minutes: i64) {
        {
            let mut config = self.config.write();
            config.advance_minutes = minutes;
            *config = config.clamped();
        }
        self.persist_config().await;
    }

    /// Flip the master switch. Disabling cancels every armed timer;
    /// enabling persists the flag only, the caller re-arms via
    /// [`restore_all`](Self::restore_all).
    pub async fn set_enabled(self: &Arc<Self>, enabled: bool) {
        self.config.write().enabled = enabled;
        self.persist_config().await;
        if !enabled {
            self.cancel_all();
            self.persist_snapshot().await;
        }
    }

    /// Currently armed alerts, sorted by treatment id for stable
    /// output.
    pub fn snapshot(&self) -> Vec<ScheduledAlertSnapshot> {
        let timers = self.timers.lock();
        let mut entries: Vec<ScheduledAlertSnapshot> = timers
            .iter()
            .map(|(id, timer)| ScheduledAlertSnapshot { treatment_id: *id, alert_at: timer.alert_at })
            .collect();
        entries.sort_by_key(|entry| entry.treatment_id);
        entries
    }

    /// The dose instant a treatment's timer is armed for, if any.
    pub fn armed_dose_at(&self, treatment_id: Uuid) -> Option<DateTime<Utc>> {
        self.timers.lock().get(&treatment_id).map(|timer| timer.dose_at)
    }

    /// Cancel everything and stop accepting fires. Terminal.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.cancel_all();
    }

    async fn persist_config(&self) {
        let config = *self.config.read();
        if let Err(err) = self.settings.store_notification_config(config).await {
            warn!(error = %err, "Failed to persist notification config");
        }
    }

    async fn persist_snapshot(&self) {
        let snapshot = self.snapshot();
        if let Err(err) = self.settings.store_alert_snapshot(&snapshot).await {
            warn!(error = %err, "Failed to persist alert snapshot");
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        if !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
        }
    }
}

/// Whether an armed dose instant still lies on the treatment's
/// schedule: the stored next occurrence itself, or a whole number of
/// cycles past it. A confirmation re-anchors `next_scheduled_time`
/// off the grid the timer was armed on, which is the only change that
/// invalidates a held timer.
fn schedule_matches(treatment: &Treatment, dose_at: DateTime<Utc>) -> bool {
    let next = treatment.next_scheduled_time;
    if dose_at == next {
        return true;
    }
    if !treatment.is_recurring() || dose_at < next {
        return false;
    }
    let cycle = treatment.frequency().num_milliseconds();
    cycle > 0 && (dose_at - next).num_milliseconds() % cycle == 0
}
