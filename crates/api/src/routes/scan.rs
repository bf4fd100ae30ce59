//! Medication label scan handler.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use dosetrack_domain::{DoseTrackError, ScannedMedication};
use serde::Deserialize;

use super::{ApiError, ApiResult};
use crate::context::AppContext;

/// Body for the scan endpoint.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// Base64-encoded label photo, with or without a data-URL header.
    pub image: String,
}

/// Extract medication candidates from a label photo.
///
/// Returns 503 when no scan API key is configured; the rest of the
/// application works without one.
pub async fn scan_label(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<ScanRequest>,
) -> ApiResult<Json<Vec<ScannedMedication>>> {
    let client = ctx.scan.as_ref().ok_or_else(|| {
        ApiError(DoseTrackError::Config("label scan is not configured".to_string()))
    })?;

    let medications = client.scan_image(&req.image).await.map_err(DoseTrackError::from)?;
    Ok(Json(medications))
}
