//! Calendar feed handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use chrono::Utc;
use dosetrack_core::calendar::export_ics;

use crate::context::AppContext;

/// Export the upcoming dose schedule as an iCalendar feed.
pub async fn export(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let treatments = ctx.store.active_treatments();
    let ics = export_ics(&treatments, Utc::now());

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"dosetrack.ics\""),
        ],
        ics,
    )
}
