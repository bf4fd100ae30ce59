//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dosetrack_core::{
    ConfirmationService, HistoryRepository, SettingsRepository, TreatmentRepository,
    TreatmentService, TreatmentStore,
};
use dosetrack_domain::{Config, NotificationConfig, Result};
use dosetrack_infra::{
    AlertDispatcher, AlertSink, BroadcastSink, DbManager, DesktopSink, DueCheckConfig,
    DueCheckLoop, HttpClient, LabelScanClient, LabelScanConfig, PerformanceMetrics,
    ReminderScheduler, SqliteHistoryRepository, SqliteSettingsRepository,
    SqliteTreatmentRepository,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub store: Arc<TreatmentStore>,
    pub treatments: Arc<TreatmentService>,
    pub confirmations: Arc<ConfirmationService>,
    pub scheduler: Arc<ReminderScheduler>,
    /// Fan-out sink backing the server-sent event stream.
    pub events: Arc<BroadcastSink>,
    /// Absent when no scan API key is configured; the endpoint then
    /// degrades to 503 instead of failing startup.
    pub scan: Option<Arc<LabelScanClient>>,
    pub metrics: Arc<PerformanceMetrics>,

    // start/stop need &mut, handlers only hold Arc<AppContext>
    due_check: Mutex<DueCheckLoop>,
}

impl AppContext {
    /// Create a new application context with default configuration
    pub async fn new() -> Result<Self> {
        Self::new_with_config(Config::default()).await
    }

    /// Create a new application context with custom configuration
    ///
    /// This method is primarily for testing, allowing tests to specify
    /// a custom database path and avoid conflicts with a production
    /// database.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        // Initialize database and apply migrations
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        // Repositories behind the core ports
        let treatment_repo: Arc<dyn TreatmentRepository> =
            Arc::new(SqliteTreatmentRepository::new(Arc::clone(&db)));
        let history_repo: Arc<dyn HistoryRepository> =
            Arc::new(SqliteHistoryRepository::new(Arc::clone(&db)));
        let settings_repo: Arc<dyn SettingsRepository> =
            Arc::new(SqliteSettingsRepository::new(Arc::clone(&db)));

        let store = Arc::new(TreatmentStore::new());
        let metrics = Arc::new(PerformanceMetrics::new());

        let treatments = Arc::new(TreatmentService::new(
            Arc::clone(&store),
            Arc::clone(&treatment_repo),
            Arc::clone(&history_repo),
            config.server.user_id.clone(),
        ));
        let confirmations = Arc::new(ConfirmationService::new(
            Arc::clone(&store),
            Arc::clone(&treatment_repo),
            Arc::clone(&history_repo),
        ));

        // Delivery: desktop notifications plus the SSE broadcast
        let events = Arc::new(BroadcastSink::new(64));
        let sinks: Vec<Arc<dyn AlertSink>> =
            vec![Arc::new(DesktopSink::new()), Arc::clone(&events) as Arc<dyn AlertSink>];
        let dispatcher = Arc::new(AlertDispatcher::new(sinks, Arc::clone(&metrics)));

        // Persisted notification settings win over the config file
        let notification_config = match settings_repo.load_notification_config().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => NotificationConfig {
                advance_minutes: config.notifications.advance_minutes,
                enabled: config.notifications.enabled,
            },
            Err(err) => {
                warn!(error = %err, "failed to load persisted notification config, using defaults");
                NotificationConfig {
                    advance_minutes: config.notifications.advance_minutes,
                    enabled: config.notifications.enabled,
                }
            }
        };

        let scheduler = ReminderScheduler::new(
            Arc::clone(&store),
            Arc::clone(&settings_repo),
            Arc::clone(&dispatcher),
            Arc::clone(&metrics),
            notification_config,
        );

        let due_check_config = DueCheckConfig {
            interval: Duration::from_secs(config.notifications.due_check_interval_secs.max(1)),
            ..Default::default()
        };
        let due_check = Mutex::new(DueCheckLoop::new(
            Arc::clone(&store),
            Arc::clone(&dispatcher),
            due_check_config,
            Arc::clone(&metrics),
        ));

        let scan = build_scan_client(&config)?;
        if scan.is_none() {
            info!("label scan disabled: no API key configured");
        }

        Ok(Self {
            config,
            db,
            store,
            treatments,
            confirmations,
            scheduler,
            events,
            scan,
            metrics,
            due_check,
        })
    }

    /// Load the session and start the background machinery.
    ///
    /// Sweeps expired treatments, mirrors the active list into the
    /// store, re-arms the reminder timers, and starts the due-check
    /// loop.
    pub async fn start(&self) -> Result<()> {
        let loaded = self.treatments.load_session(Utc::now()).await?;
        info!(count = loaded.len(), "session loaded");

        self.scheduler.restore_all().await;
        self.due_check.lock().await.start().await?;

        info!("application context started");
        Ok(())
    }

    /// Stop the background machinery gracefully.
    ///
    /// The reminder timers are cancelled through the scheduler's
    /// shutdown token; per-timer state was already persisted as each
    /// timer was armed.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");

        let mut due_check = self.due_check.lock().await;
        if due_check.is_running() {
            due_check.stop().await?;
        }
        self.scheduler.shutdown();

        Ok(())
    }

    /// Check health of all application components
    ///
    /// Returns a HealthStatus with individual component checks and an
    /// overall score (healthy components / total components); the
    /// application is healthy at a score of 0.8 or above.
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new();

        status = status.add_component(self.check_database_health().await);

        let due_check_running = self.due_check.lock().await.is_running();
        status = status.add_component(if due_check_running {
            ComponentHealth::healthy("due_check")
        } else {
            ComponentHealth::unhealthy("due_check", "loop not running")
        });

        // The scheduler has no background task of its own; it is
        // healthy as long as the context holds it.
        status = status.add_component(ComponentHealth::healthy("reminder_scheduler"));
        status = status.add_component(ComponentHealth::healthy("event_stream"));

        status.calculate_score();
        status
    }

    /// Check database health with a simple query.
    ///
    /// Uses spawn_blocking to keep the synchronous connection checkout
    /// off the async runtime.
    async fn check_database_health(&self) -> ComponentHealth {
        let db = Arc::clone(&self.db);
        match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(e)) => {
                warn!(error = %e, "database health check failed");
                ComponentHealth::unhealthy("database", format!("query failed: {e}"))
            }
            Err(e) => {
                warn!(error = %e, "database health check task panicked");
                ComponentHealth::unhealthy("database", format!("task panic: {e}"))
            }
        }
    }
}

fn build_scan_client(config: &Config) -> Result<Option<Arc<LabelScanClient>>> {
    let Some(api_key) = config.scan.api_key.as_deref() else {
        return Ok(None);
    };

    let mut scan_config = LabelScanConfig::new(api_key).with_model(config.scan.model.clone());
    if let Some(endpoint) = config.scan.endpoint.as_deref() {
        scan_config = scan_config.with_endpoint(endpoint);
    }

    let http = HttpClient::builder()
        .timeout(Duration::from_secs(60))
        .user_agent("dosetrack")
        .build()?;

    Ok(Some(Arc::new(LabelScanClient::new(scan_config, http))))
}
