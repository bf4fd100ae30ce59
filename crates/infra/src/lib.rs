//! # DoseTrack Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - SQLite persistence (rusqlite + r2d2 pool)
//! - The reminder scheduler and due-check loop
//! - Alert delivery sinks (desktop + broadcast)
//! - The remote label-scan client
//! - Configuration loading and lightweight metrics
//!
//! ## Architecture
//! - Implements traits defined in `dosetrack-core`
//! - Depends on `dosetrack-domain` and `dosetrack-core`
//! - Contains all "impure" code (I/O, timers, network)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod notify;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use database::{
    DbManager, SqliteHistoryRepository, SqliteSettingsRepository, SqliteTreatmentRepository,
};
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::labelscan::{LabelScanClient, LabelScanConfig};
pub use notify::{Alert, AlertDispatcher, AlertSink, BroadcastSink, DesktopSink};
pub use observability::{MetricsResult, PerformanceMetrics};
pub use scheduling::{
    DueCheckConfig, DueCheckLoop, ReminderScheduler, SchedulerError, SchedulerResult,
};
