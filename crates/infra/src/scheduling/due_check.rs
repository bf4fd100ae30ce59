//! Interval safety net behind the absolute timers.
//!
//! Every tick scans the in-memory store for doses entering their
//! trigger band and raises an alert for each. A dose instant is
//! announced at most once, so sitting inside the band across several
//! ticks does not spam the sinks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dosetrack_core::{dosing, TreatmentStore};
use dosetrack_domain::constants::DEFAULT_DUE_CHECK_INTERVAL_SECS;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::notify::{Alert, AlertDispatcher};
use crate::observability::{log_metric, PerformanceMetrics};
use crate::scheduling::error::{SchedulerError, SchedulerResult};

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the due-check loop
#[derive(Debug, Clone)]
pub struct DueCheckConfig {
    /// Poll interval
    pub interval: Duration,
    /// Timeout when joining the loop task on stop
    pub join_timeout: Duration,
}

impl Default for DueCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_DUE_CHECK_INTERVAL_SECS),
            join_timeout: Duration::from_secs(5),
        }
    }
}

struct DueCheckContext {
    store: Arc<TreatmentStore>,
    dispatcher: Arc<AlertDispatcher>,
    metrics: Arc<PerformanceMetrics>,
    /// Dose instants already announced, per treatment.
    announced: SyncMutex<HashMap<Uuid, DateTime<Utc>>>,
}

/// Periodic due-dose scanner with explicit lifecycle management.
pub struct DueCheckLoop {
    store: Arc<TreatmentStore>,
    dispatcher: Arc<AlertDispatcher>,
    config: DueCheckConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
    metrics: Arc<PerformanceMetrics>,
}

impl DueCheckLoop {
    pub fn new(
        store: Arc<TreatmentStore>,
        dispatcher: Arc<AlertDispatcher>,
        config: DueCheckConfig,
        metrics: Arc<PerformanceMetrics>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
            metrics,
        }
    }

    /// Start the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop is already running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting due-check loop");

        // New token each start, so stop/start cycles work
        self.cancellation_token = CancellationToken::new();

        let context = DueCheckContext {
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
            metrics: Arc::clone(&self.metrics),
            announced: SyncMutex::new(HashMap::new()),
        };
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::run_loop(context, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Due-check loop started");
        Ok(())
    }

    /// Stop the loop gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop is not running or the task does
    /// not finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping due-check loop");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })??;
        }

        info!("Due-check loop stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn run_loop(context: DueCheckContext, interval: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Due-check loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    Self::tick(&context).await;
                }
            }
        }
    }

    async fn tick(context: &DueCheckContext) {
        let now = Utc::now();

        for treatment in context.store.active_treatments() {
            let scheduled = treatment.next_scheduled_time;
            if !dosing::in_due_window(scheduled, now) || !dosing::in_trigger_band(scheduled, now) {
                continue;
            }

            let already_announced = context
                .announced
                .lock()
                .get(&treatment.id)
                .map(|at| *at == scheduled)
                .unwrap_or(false);
            if already_announced {
                continue;
            }

            debug!(treatment_id = %treatment.id, scheduled = %scheduled, "Dose due");
            log_metric(context.metrics.record_alert_fired(), "due_check.fired");

            let alert = Alert::for_treatment(&treatment, scheduled);
            match context.dispatcher.dispatch(&alert).await {
                Ok(()) => {
                    context.announced.lock().insert(treatment.id, scheduled);
                }
                Err(err) => {
                    warn!(treatment_id = %treatment.id, error = %err, "Due alert dispatch failed");
                }
            }
        }
    }
}

/// Ensure the loop is stopped when dropped
impl Drop for DueCheckLoop {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            warn!("DueCheckLoop dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
