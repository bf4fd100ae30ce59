//! Treatment CRUD and dose confirmation handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use dosetrack_core::{ConfirmationOutcome, NewTreatment, UpdateTreatment};
use dosetrack_domain::{DoseAction, DoseTrackError, Treatment};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::context::AppContext;

/// List the session's treatments, soonest dose first.
pub async fn list(State(ctx): State<Arc<AppContext>>) -> Json<Vec<Treatment>> {
    let mut treatments = ctx.store.all();
    treatments.sort_by_key(|t| t.next_scheduled_time);
    Json(treatments)
}

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    Json(new): Json<NewTreatment>,
) -> ApiResult<(StatusCode, Json<Treatment>)> {
    let treatment = ctx.treatments.create(new).await?;
    ctx.scheduler.schedule(&treatment).await;
    Ok((StatusCode::CREATED, Json(treatment)))
}

pub async fn get_one(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Treatment>> {
    let treatment = ctx
        .treatments
        .get(id)
        .await?
        .ok_or_else(|| ApiError(DoseTrackError::NotFound(format!("treatment {id}"))))?;
    Ok(Json(treatment))
}

pub async fn update(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateTreatment>,
) -> ApiResult<Json<Treatment>> {
    let treatment = ctx.treatments.update(id, update).await?;
    // schedule() clears the timer itself when the edit deactivated it
    ctx.scheduler.schedule(&treatment).await;
    Ok(Json(treatment))
}

pub async fn delete(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.treatments.delete(id).await?;
    ctx.scheduler.cancel(id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_active(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Treatment>> {
    let treatment = ctx.treatments.toggle_active(id).await?;
    ctx.scheduler.schedule(&treatment).await;
    Ok(Json(treatment))
}

/// Body for the confirm endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub action: DoseAction,
    /// User-reported dose time; defaults to now when absent.
    #[serde(default)]
    pub actual_time: Option<DateTime<Utc>>,
}

pub async fn confirm(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Json<ConfirmationOutcome>> {
    let now = Utc::now();
    let actual_time = req.actual_time.unwrap_or(now);

    let outcome = ctx.confirmations.confirm(id, req.action, actual_time, now).await?;
    if let Some(treatment) = &outcome.treatment {
        ctx.scheduler.schedule(treatment).await;
    }

    Ok(Json(outcome))
}
