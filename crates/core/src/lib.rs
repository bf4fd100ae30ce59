//! # DoseTrack Core
//!
//! Business logic for the dose-scheduling engine.
//!
//! This crate contains:
//! - Dose-cycle math (roll-forward, drift detection, catch-up)
//! - The in-memory treatment store mirrored from persistence
//! - Port traits for repositories (implemented in `dosetrack-infra`)
//! - Treatment CRUD and dose-confirmation services
//! - Calendar (.ics) export
//!
//! ## Architecture
//! - Depends only on `dosetrack-domain`
//! - Pure logic and ports; all I/O lives behind the port traits

pub mod calendar;
pub mod dosing;
pub mod store;
pub mod treatment;

pub use store::TreatmentStore;
pub use treatment::confirmation::{ConfirmationOutcome, ConfirmationService};
pub use treatment::ports::{
    HistoryRepository, ScheduledAlertSnapshot, SettingsRepository, TreatmentRepository,
};
pub use treatment::service::{NewTreatment, TreatmentService, UpdateTreatment};
