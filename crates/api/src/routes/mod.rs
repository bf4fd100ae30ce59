//! HTTP surface: router assembly and error mapping.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use dosetrack_domain::DoseTrackError;

use crate::context::AppContext;

pub mod calendar;
pub mod health;
pub mod history;
pub mod notifications;
pub mod scan;
pub mod treatments;

/// Build the full application router.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health::get_health))
        .route("/api/treatments", get(treatments::list).post(treatments::create))
        .route(
            "/api/treatments/{id}",
            get(treatments::get_one).put(treatments::update).delete(treatments::delete),
        )
        .route("/api/treatments/{id}/toggle", post(treatments::toggle_active))
        .route("/api/treatments/{id}/confirm", post(treatments::confirm))
        .route("/api/history", get(history::list))
        .route("/api/history/{id}", put(history::edit).delete(history::delete))
        .route(
            "/api/notifications/config",
            get(notifications::get_config).put(notifications::put_config),
        )
        .route("/api/notifications/events", get(notifications::events))
        .route("/api/scan", post(scan::scan_label))
        .route("/calendar.ics", get(calendar::export))
        .with_state(ctx)
}

/// Domain error wrapper implementing axum's response conversion.
///
/// The body is the serde-tagged domain error, so clients can match on
/// `type` without parsing the message.
#[derive(Debug)]
pub struct ApiError(pub DoseTrackError);

impl From<DoseTrackError> for ApiError {
    fn from(err: DoseTrackError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DoseTrackError::NotFound(_) => StatusCode::NOT_FOUND,
            DoseTrackError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DoseTrackError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            DoseTrackError::Network(_) => StatusCode::BAD_GATEWAY,
            DoseTrackError::Database(_)
            | DoseTrackError::Scheduler(_)
            | DoseTrackError::Delivery(_)
            | DoseTrackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        (status, Json(self.0)).into_response()
    }
}

/// Handler result shorthand.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
