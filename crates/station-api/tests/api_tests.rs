//! Router integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use station_api::{create_router, ApiConfig, AppState, ChannelControl};
use station_models::{ChannelKind, SlotStatus, StatusSnapshot};
use tokio::sync::watch;
use tower::ServiceExt;

const KEY: &str = "central-api-key";

/// Two active lofi slots, no rain slots.
#[derive(Default)]
struct FakeControl {
    restart_calls: AtomicUsize,
}

#[async_trait]
impl ChannelControl for FakeControl {
    async fn restart_kind(&self, kind: ChannelKind) -> usize {
        self.restart_calls.fetch_add(1, Ordering::SeqCst);
        match kind {
            ChannelKind::LofiBackground => 2,
            ChannelKind::Rain => 0,
        }
    }

    async fn slots(&self) -> Vec<SlotStatus> {
        vec![SlotStatus {
            name: "Lofi-4".into(),
            kind: ChannelKind::LofiBackground,
            active: true,
            broadcast_id: Some("bc-4".into()),
            asset_title: Some("Night Study".into()),
            restarts: 0,
            started_at: None,
            rotate_at: None,
        }]
    }
}

fn router_with(config: ApiConfig, control: Option<Arc<FakeControl>>) -> (Router, watch::Sender<StatusSnapshot>) {
    let (tx, rx) = watch::channel(StatusSnapshot::starting("live"));
    let mut state = AppState::new(config, rx);
    if let Some(control) = control {
        state = state.with_control(control);
    }
    (create_router(state, None), tx)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn restart_request(kind: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(format!("/control/restart/{}", kind));
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _tx) = router_with(ApiConfig::default(), None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Content-Type-Options").unwrap(), "nosniff");
    assert!(response.headers().contains_key("X-Request-ID"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_status_reflects_latest_snapshot() {
    let (app, tx) = router_with(ApiConfig::default(), None);

    let mut snapshot = StatusSnapshot::starting("live");
    snapshot.status_text = "LIVE: Rainy Tokyo Nights".into();
    snapshot.title = Some("Rainy Tokyo Nights".into());
    tx.send(snapshot).unwrap();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status_text"], "LIVE: Rainy Tokyo Nights");
    assert_eq!(body["mode"], "live");

    let page = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let html = to_bytes(page.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("Title: Rainy Tokyo Nights"));
}

#[tokio::test]
async fn test_control_requires_matching_key() {
    let control = Arc::new(FakeControl::default());
    let (app, _tx) = router_with(ApiConfig::default().with_admin_key(KEY), Some(control.clone()));

    let missing = app.clone().oneshot(restart_request("lofi-bg", None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    assert!(body_json(missing).await["detail"].is_string());

    let wrong = app.oneshot(restart_request("lofi-bg", Some("nope"))).await.unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    assert_eq!(control.restart_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_control_rejected_when_no_key_configured() {
    let control = Arc::new(FakeControl::default());
    let (app, _tx) = router_with(ApiConfig::default(), Some(control.clone()));

    let response = app.oneshot(restart_request("lofi-bg", Some(KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(control.restart_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restart_lofi_channels() {
    let control = Arc::new(FakeControl::default());
    let (app, _tx) = router_with(ApiConfig::default().with_admin_key(KEY), Some(control.clone()));

    let response = app.oneshot(restart_request("lofi-bg", Some(KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["restarted"], 2);
    assert_eq!(body["kind"], "lofi-bg");
}

#[tokio::test]
async fn test_restart_with_nothing_active_is_404() {
    let control = Arc::new(FakeControl::default());
    let (app, _tx) = router_with(ApiConfig::default().with_admin_key(KEY), Some(control));

    let response = app.oneshot(restart_request("rain", Some(KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_control_slots_listing() {
    let control = Arc::new(FakeControl::default());
    let (app, _tx) = router_with(ApiConfig::default().with_admin_key(KEY), Some(control));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/control/slots")
                .header("x-api-key", KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["name"], "Lofi-4");
}

#[tokio::test]
async fn test_control_without_channels_is_unavailable() {
    let (app, _tx) = router_with(ApiConfig::default().with_admin_key(KEY), None);

    let response = app.oneshot(restart_request("rain", Some(KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_control_rate_limiting() {
    let control = Arc::new(FakeControl::default());
    let config = ApiConfig {
        control_rate_limit_rps: 1,
        ..ApiConfig::default().with_admin_key(KEY)
    };
    let (app, _tx) = router_with(config, Some(control));

    let first = app.clone().oneshot(restart_request("lofi-bg", Some(KEY))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(restart_request("lofi-bg", Some(KEY))).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers().get("Retry-After").unwrap(), "1");
}

#[tokio::test]
async fn test_metrics_route_absent_without_handle() {
    let (app, _tx) = router_with(ApiConfig::default(), None);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
