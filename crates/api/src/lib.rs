//! # DoseTrack App
//!
//! HTTP application layer - routes and main entry point.
//!
//! This crate contains:
//! - The axum router and request handlers
//! - Application context (dependency injection)
//! - Main entry point and setup
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Serves the JSON API, the event stream, and the calendar feed

pub mod context;
pub mod routes;
pub mod utils;

// Re-export for convenience
pub use context::AppContext;
pub use routes::build_router;
