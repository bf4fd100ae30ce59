//! End-to-end tests for the HTTP surface.
//!
//! Each test spins up an AppContext on a temporary database and drives
//! the router directly, covering the treatment workflow, history edits,
//! notification settings, the calendar feed, and the scan endpoint's
//! unconfigured fallback.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use dosetrack_app::{build_router, AppContext};
use dosetrack_domain::{Config, DatabaseConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct ApiHarness {
    #[allow(dead_code)]
    temp_dir: TempDir,
    ctx: Arc<AppContext>,
    router: Router,
}

impl ApiHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("temporary directory");
        let config = Config {
            database: DatabaseConfig {
                path: temp_dir.path().join("dosetrack.db").to_string_lossy().to_string(),
                pool_size: 4,
            },
            ..Config::default()
        };

        let ctx = Arc::new(AppContext::new_with_config(config).await.expect("context"));
        ctx.start().await.expect("context start");
        let router = build_router(Arc::clone(&ctx));

        Self { temp_dir, ctx, router }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                builder.body(Body::from(json.to_string())).expect("request")
            }
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    async fn create_treatment(&self, name: &str, frequency_hours: i64) -> Value {
        let start = Utc::now() + Duration::hours(1);
        let (status, body) = self
            .request(
                Method::POST,
                "/api/treatments",
                Some(json!({
                    "name": name,
                    "kind": "medication",
                    "instructions": "with water",
                    "frequencyHours": frequency_hours,
                    "startDate": start.to_rfc3339(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_and_fetch_treatment() {
    let api = ApiHarness::new().await;

    let created = api.create_treatment("Amoxicillin", 8).await;
    let id = created["id"].as_str().expect("id").to_string();
    assert_eq!(created["name"], "Amoxicillin");
    assert_eq!(created["frequencyHours"], 8);
    assert_eq!(created["active"], true);

    let (status, fetched) = api.request(Method::GET, &format!("/api/treatments/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, list) = api.request(Method::GET, "/api/treatments", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = list.as_array().expect("list");
    assert_eq!(items.len(), 1);

    // A timer was armed for the new treatment.
    assert_eq!(api.ctx.scheduler.snapshot().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_name_is_rejected() {
    let api = ApiHarness::new().await;

    let (status, body) = api
        .request(
            Method::POST,
            "/api/treatments",
            Some(json!({
                "name": "   ",
                "kind": "medication",
                "frequencyHours": 8,
                "startDate": Utc::now().to_rfc3339(),
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "InvalidInput");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_treatment_is_404() {
    let api = ApiHarness::new().await;

    let (status, body) = api
        .request(
            Method::GET,
            "/api/treatments/7f8c9b6a-1234-4e5f-9a0b-000000000000",
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["type"], "NotFound");
}

#[tokio::test(flavor = "multi_thread")]
async fn confirm_take_advances_schedule_and_appends_history() {
    let api = ApiHarness::new().await;

    let created = api.create_treatment("Ibuprofen", 8).await;
    let id = created["id"].as_str().expect("id").to_string();

    let (status, outcome) = api
        .request(
            Method::POST,
            &format!("/api/treatments/{id}/confirm"),
            Some(json!({ "action": "take" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["applied"], true);
    assert_eq!(outcome["syncWarning"], false);

    // The next dose moved roughly one frequency ahead of now.
    let (_, fetched) = api.request(Method::GET, &format!("/api/treatments/{id}"), None).await;
    let next: chrono::DateTime<Utc> = fetched["nextScheduledTime"]
        .as_str()
        .expect("nextScheduledTime")
        .parse()
        .expect("timestamp");
    assert!(next > Utc::now() + Duration::hours(7));

    let (status, history) = api.request(Method::GET, "/api/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history.as_array().expect("history");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "taken");
    assert_eq!(entries[0]["treatmentName"], "Ibuprofen");
}

#[tokio::test(flavor = "multi_thread")]
async fn history_edit_and_delete_within_window() {
    let api = ApiHarness::new().await;

    let created = api.create_treatment("Paracetamol", 6).await;
    let id = created["id"].as_str().expect("id").to_string();

    let (_, _) = api
        .request(
            Method::POST,
            &format!("/api/treatments/{id}/confirm"),
            Some(json!({ "action": "take" })),
        )
        .await;
    let (_, history) = api.request(Method::GET, "/api/history", None).await;
    let entry_id = history[0]["id"].as_str().expect("entry id").to_string();

    let corrected = Utc::now() - Duration::minutes(30);
    let (status, _) = api
        .request(
            Method::PUT,
            &format!("/api/history/{entry_id}"),
            Some(json!({
                "actualTime": corrected.to_rfc3339(),
                "status": "skipped",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, history) = api.request(Method::GET, "/api/history", None).await;
    assert_eq!(history[0]["status"], "skipped");

    let (status, _) =
        api.request(Method::DELETE, &format!("/api/history/{entry_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, history) = api.request(Method::GET, "/api/history", None).await;
    assert_eq!(history.as_array().expect("history").len(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn toggle_and_delete_treatment() {
    let api = ApiHarness::new().await;

    let created = api.create_treatment("Vitamin D", 24).await;
    let id = created["id"].as_str().expect("id").to_string();

    let (status, toggled) =
        api.request(Method::POST, &format!("/api/treatments/{id}/toggle"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["active"], false);
    // Pausing a treatment clears its timer.
    assert!(api.ctx.scheduler.snapshot().is_empty());

    let (status, _) = api.request(Method::DELETE, &format!("/api/treatments/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = api.request(Method::GET, &format!("/api/treatments/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn notification_config_round_trip_and_clamp() {
    let api = ApiHarness::new().await;

    let (status, config) = api.request(Method::GET, "/api/notifications/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["advanceMinutes"], 15);
    assert_eq!(config["enabled"], true);

    let (status, updated) = api
        .request(
            Method::PUT,
            "/api/notifications/config",
            Some(json!({ "advanceMinutes": 30, "enabled": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["advanceMinutes"], 30);
    assert_eq!(updated["enabled"], false);

    // Out-of-range advance is clamped, not rejected.
    let (status, clamped) = api
        .request(
            Method::PUT,
            "/api/notifications/config",
            Some(json!({ "advanceMinutes": 240, "enabled": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clamped["advanceMinutes"], 60);
}

#[tokio::test(flavor = "multi_thread")]
async fn calendar_feed_contains_upcoming_doses() {
    let api = ApiHarness::new().await;
    api.create_treatment("Amoxicillin", 8).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/calendar.ics")
        .body(Body::empty())
        .expect("request");
    let response = api.router.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/calendar"));

    let bytes =
        axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let ics = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(ics.contains("BEGIN:VCALENDAR"));
    assert!(ics.contains("SUMMARY:Take Amoxicillin"));
    assert!(ics.contains("BEGIN:VALARM"));
}

#[tokio::test(flavor = "multi_thread")]
async fn scan_without_api_key_degrades() {
    let api = ApiHarness::new().await;

    let (status, body) = api
        .request(Method::POST, "/api/scan", Some(json!({ "image": "aGVsbG8=" })))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["type"], "Config");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_endpoint_reports_running_components() {
    let api = ApiHarness::new().await;

    let (status, health) = api.request(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["is_healthy"], true);
    assert!(health["components"].as_array().expect("components").len() >= 3);
}
