//! Alert delivery sinks.
//!
//! An [`Alert`] is the rendered payload for one reminder. Sinks are
//! probed for availability at dispatch time; a sink that reports
//! unavailable is skipped without counting as a failure. Delivery
//! succeeds when at least one sink accepted the alert.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dosetrack_domain::{DoseTrackError, Result, Treatment};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::observability::{log_metric, PerformanceMetrics};

/// Rendered reminder payload handed to every sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Stable replacement tag, one alert visible per treatment.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub treatment_id: Uuid,
    /// The dose time this alert announces (not the time it fired).
    pub dose_at: DateTime<Utc>,
}

impl Alert {
    pub fn for_treatment(treatment: &Treatment, dose_at: DateTime<Utc>) -> Self {
        let body = match &treatment.instructions {
            Some(instructions) if !instructions.trim().is_empty() => {
                format!("Time to take {} ({})", treatment.name, instructions.trim())
            }
            _ => format!("Time to take {}", treatment.name),
        };
        Self {
            tag: format!("medication-{}", treatment.id),
            title: "Medication reminder".to_string(),
            body,
            treatment_id: treatment.id,
            dose_at,
        }
    }
}

/// One delivery channel for alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap availability probe, checked before every delivery.
    fn is_available(&self) -> bool;

    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Desktop notifications via the platform notification service.
pub struct DesktopSink;

impl DesktopSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSink for DesktopSink {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn is_available(&self) -> bool {
        // The notification daemon can only be probed by talking to it.
        // Delivery errors are handled per-alert instead.
        true
    }

    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let title = alert.title.clone();
        let body = alert.body.clone();
        // show() blocks on the notification bus handshake
        let shown = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .summary(&title)
                .body(&body)
                .appname("dosetrack")
                .icon("alarm-clock")
                .show()
        })
        .await
        .map_err(|err| DoseTrackError::Delivery(format!("notification task failed: {err}")))?;

        shown.map_err(|err| DoseTrackError::Delivery(format!("desktop notification: {err}")))?;
        Ok(())
    }
}

/// In-process fanout for connected clients (SSE streams subscribe here).
pub struct BroadcastSink {
    sender: broadcast::Sender<Alert>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl AlertSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn is_available(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    async fn deliver(&self, alert: &Alert) -> Result<()> {
        self.sender
            .send(alert.clone())
            .map_err(|_| DoseTrackError::Delivery("no connected subscribers".to_string()))?;
        Ok(())
    }
}

/// Fans one alert out to every available sink.
pub struct AlertDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
    metrics: Arc<PerformanceMetrics>,
}

impl AlertDispatcher {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>, metrics: Arc<PerformanceMetrics>) -> Self {
        Self { sinks, metrics }
    }

    /// Deliver to every available sink. Returns Ok when at least one
    /// sink accepted the alert, or when no sink was available at all
    /// (nothing to do is not a failure).
    pub async fn dispatch(&self, alert: &Alert) -> Result<()> {
        let mut attempted = 0usize;
        let mut delivered = 0usize;
        let mut last_error: Option<DoseTrackError> = None;

        for sink in &self.sinks {
            if !sink.is_available() {
                debug!(sink = sink.name(), tag = %alert.tag, "Sink unavailable, skipping");
                continue;
            }
            attempted += 1;
            match sink.deliver(alert).await {
                Ok(()) => {
                    delivered += 1;
                    log_metric(self.metrics.record_alert_delivered(), "alerts.delivered");
                }
                Err(err) => {
                    warn!(sink = sink.name(), tag = %alert.tag, error = %err, "Alert delivery failed");
                    log_metric(self.metrics.record_delivery_error(), "alerts.delivery_error");
                    last_error = Some(err);
                }
            }
        }

        if attempted == 0 || delivered > 0 {
            Ok(())
        } else {
            Err(last_error
                .unwrap_or_else(|| DoseTrackError::Delivery("all sinks failed".to_string())))
        }
    }
}
