//! Request handlers.

use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use station_models::{ChannelKind, SlotStatus, StatusSnapshot};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::page::render_status_page;
use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// HTML status page.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_status_page(&state.snapshot(), state.uptime_minutes()))
}

/// JSON status snapshot.
pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.snapshot())
}

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub kind: ChannelKind,
    pub restarted: usize,
    pub message: String,
}

/// Interrupt every active encoder of one kind.
pub async fn control_restart(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<RestartResponse>> {
    let control = state
        .control
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Channel control is not running"))?;

    let kind: ChannelKind = kind
        .parse()
        .map_err(|_| ApiError::not_found(format!("Unknown channel kind '{}'", kind)))?;

    let restarted = control.restart_kind(kind).await;
    if restarted == 0 {
        return Err(ApiError::not_found(format!("No active {} channels to restart", kind)));
    }

    info!(kind = %kind, restarted, "Channel restart requested");
    Ok(Json(RestartResponse {
        kind,
        restarted,
        message: format!("Restarting {} {} channels", restarted, kind),
    }))
}

/// Current slot list.
pub async fn control_slots(State(state): State<AppState>) -> ApiResult<Json<Vec<SlotStatus>>> {
    let control = state
        .control
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Channel control is not running"))?;
    Ok(Json(control.slots().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::control::MockChannelControl;
    use axum::response::IntoResponse;
    use std::sync::Arc;
    use tokio::sync::watch;

    fn state_with(control: MockChannelControl) -> AppState {
        let (_tx, rx) = watch::channel(StatusSnapshot::starting("channels"));
        AppState::new(ApiConfig::default(), rx).with_control(Arc::new(control))
    }

    #[tokio::test]
    async fn test_restart_passes_parsed_kind() {
        let mut control = MockChannelControl::new();
        control
            .expect_restart_kind()
            .withf(|kind| *kind == ChannelKind::LofiBackground)
            .times(1)
            .returning(|_| 2);

        let Json(body) = control_restart(State(state_with(control)), Path("lofi".to_string()))
            .await
            .unwrap();
        assert_eq!(body.restarted, 2);
        assert_eq!(body.kind, ChannelKind::LofiBackground);
    }

    #[tokio::test]
    async fn test_restart_nothing_active_is_not_found() {
        let mut control = MockChannelControl::new();
        control.expect_restart_kind().returning(|_| 0);

        let err = control_restart(State(state_with(control)), Path("rain".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_kind_never_reaches_control() {
        let mut control = MockChannelControl::new();
        control.expect_restart_kind().never();

        let err = control_restart(State(state_with(control)), Path("jazz".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), axum::http::StatusCode::NOT_FOUND);
    }
}
