//! Performance metrics for infrastructure operations.
//!
//! All record methods return `MetricsResult<()>` so quota or validation
//! failures can be surfaced later without breaking callers; today they
//! always succeed. Counters are plain atomics, no locking.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::warn;

/// Metrics error type.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Empty data set, cannot calculate an aggregate metric.
    #[error("Empty data: cannot calculate {metric}")]
    EmptyData { metric: &'static str },
}

/// Result type for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Counters for the alert pipeline, from arming a timer through
/// delivery to a sink.
#[derive(Debug, Default)]
pub struct AlertMetrics {
    pub alerts_scheduled: AtomicUsize,
    pub alerts_cancelled: AtomicUsize,
    pub alerts_fired: AtomicUsize,
    pub alerts_delivered: AtomicUsize,
    pub delivery_errors: AtomicUsize,
}

impl AlertMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scheduled(&self) -> MetricsResult<()> {
        self.alerts_scheduled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_cancelled(&self) -> MetricsResult<()> {
        self.alerts_cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_fired(&self) -> MetricsResult<()> {
        self.alerts_fired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_delivered(&self) -> MetricsResult<()> {
        self.alerts_delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_delivery_error(&self) -> MetricsResult<()> {
        self.delivery_errors.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn fired_count(&self) -> usize {
        self.alerts_fired.load(Ordering::SeqCst)
    }

    pub fn delivered_count(&self) -> usize {
        self.alerts_delivered.load(Ordering::SeqCst)
    }

    /// Delivery success rate as a percentage (0.0 to 100.0). Returns
    /// 0.0 when nothing has fired yet.
    pub fn delivery_rate_pct(&self) -> f64 {
        let delivered = self.alerts_delivered.load(Ordering::SeqCst);
        let errors = self.delivery_errors.load(Ordering::SeqCst);
        let total = delivered + errors;
        if total == 0 {
            return 0.0;
        }
        (delivered as f64 / total as f64) * 100.0
    }
}

/// Database query counters.
#[derive(Debug, Default)]
pub struct DbMetrics {
    pub queries_executed: AtomicUsize,
    pub query_errors: AtomicUsize,
    pub total_query_time_ms: AtomicU64,
}

impl DbMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query_executed(&self, duration_ms: u64) -> MetricsResult<()> {
        self.queries_executed.fetch_add(1, Ordering::SeqCst);
        self.total_query_time_ms.fetch_add(duration_ms, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_query_error(&self) -> MetricsResult<()> {
        self.query_errors.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Average query time in milliseconds, 0.0 when no queries ran.
    pub fn avg_query_time_ms(&self) -> f64 {
        let count = self.queries_executed.load(Ordering::SeqCst);
        if count == 0 {
            return 0.0;
        }
        self.total_query_time_ms.load(Ordering::SeqCst) as f64 / count as f64
    }
}

/// Outbound HTTP counters (label scans).
#[derive(Debug, Default)]
pub struct FetchMetrics {
    pub fetch_count: AtomicUsize,
    pub fetch_errors: AtomicUsize,
    pub fetch_timeouts: AtomicUsize,
    pub total_fetch_time_ms: AtomicU64,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch_time(&self, duration: Duration) -> MetricsResult<()> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.total_fetch_time_ms.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_error(&self) -> MetricsResult<()> {
        self.fetch_errors.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_timeout(&self) -> MetricsResult<()> {
        self.fetch_timeouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn avg_fetch_time_ms(&self) -> f64 {
        let count = self.fetch_count.load(Ordering::SeqCst);
        if count == 0 {
            return 0.0;
        }
        self.total_fetch_time_ms.load(Ordering::SeqCst) as f64 / count as f64
    }

    pub fn timeout_count(&self) -> usize {
        self.fetch_timeouts.load(Ordering::SeqCst)
    }
}

/// Aggregates the individual metric groups and exposes convenience
/// methods for the common recordings.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    pub alerts: AlertMetrics,
    pub db: DbMetrics,
    pub fetch: FetchMetrics,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_alert_scheduled(&self) -> MetricsResult<()> {
        self.alerts.record_scheduled()
    }

    pub fn record_alert_cancelled(&self) -> MetricsResult<()> {
        self.alerts.record_cancelled()
    }

    pub fn record_alert_fired(&self) -> MetricsResult<()> {
        self.alerts.record_fired()
    }

    pub fn record_alert_delivered(&self) -> MetricsResult<()> {
        self.alerts.record_delivered()
    }

    pub fn record_delivery_error(&self) -> MetricsResult<()> {
        self.alerts.record_delivery_error()
    }

    pub fn record_db_query_executed(&self, duration_ms: u64) -> MetricsResult<()> {
        self.db.record_query_executed(duration_ms)
    }

    pub fn record_db_query_error(&self) -> MetricsResult<()> {
        self.db.record_query_error()
    }

    pub fn record_fetch_time(&self, duration: Duration) -> MetricsResult<()> {
        self.fetch.record_fetch_time(duration)
    }

    pub fn record_fetch_error(&self) -> MetricsResult<()> {
        self.fetch.record_error()
    }

    pub fn record_fetch_timeout(&self) -> MetricsResult<()> {
        self.fetch.record_timeout()
    }
}

/// Log-and-continue wrapper for metric recording in hot paths.
pub fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        warn!(metric = metric, error = ?err, "Failed to record metric");
    }
}
