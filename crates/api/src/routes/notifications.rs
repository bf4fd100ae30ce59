//! Notification settings and the live event stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use dosetrack_domain::NotificationConfig;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::ApiResult;
use crate::context::AppContext;

pub async fn get_config(State(ctx): State<Arc<AppContext>>) -> Json<NotificationConfig> {
    Json(ctx.scheduler.notification_config())
}

/// Apply a new notification config. The setters clamp and persist
/// only; the explicit restore re-arms every timer with the settings
/// now in force.
pub async fn put_config(
    State(ctx): State<Arc<AppContext>>,
    Json(config): Json<NotificationConfig>,
) -> ApiResult<Json<NotificationConfig>> {
    ctx.scheduler.set_advance_minutes(config.advance_minutes).await;
    ctx.scheduler.set_enabled(config.enabled).await;
    if config.enabled {
        ctx.scheduler.restore_all().await;
    }
    Ok(Json(ctx.scheduler.notification_config()))
}

/// Server-sent event stream of fired alerts.
///
/// Each subscriber gets its own broadcast receiver; a slow consumer
/// that lags simply misses the overwritten alerts.
pub async fn events(
    State(ctx): State<Arc<AppContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = ctx.events.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(alert) => {
                    let event = match Event::default().event("alert").json_data(&alert) {
                        Ok(event) => event,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize alert event");
                            continue;
                        }
                    };
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged, alerts dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
