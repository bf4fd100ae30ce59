//! Dose history handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use dosetrack_domain::{DoseStatus, HistoryEntry};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::context::AppContext;

const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// List recent history, newest first.
pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = ctx.treatments.history_recent(limit).await?;
    Ok(Json(entries))
}

/// Body for history edits.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditHistoryRequest {
    pub actual_time: DateTime<Utc>,
    pub status: DoseStatus,
}

/// Edit an entry; rejected outside the 24 h window.
pub async fn edit(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<EditHistoryRequest>,
) -> ApiResult<StatusCode> {
    ctx.treatments.edit_history(id, req.actual_time, req.status, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an entry; same window as edits.
pub async fn delete(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.treatments.delete_history(id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}
