//! Health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::context::AppContext;
use crate::utils::health::HealthStatus;

/// Component health report; 503 when the overall score is degraded.
pub async fn get_health(
    State(ctx): State<Arc<AppContext>>,
) -> (StatusCode, Json<HealthStatus>) {
    let status = ctx.health_check().await;
    let code =
        if status.is_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(status))
}
