//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{control_restart, control_slots, health, index, status};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    api_key_auth, create_rate_limiter, rate_limit_middleware, request_id, request_logging, security_headers,
};
use crate::state::AppState;

/// Create the status server router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = create_rate_limiter(state.config.control_rate_limit_rps);

    // Key check runs after the rate limiter so bad keys still consume quota.
    let control_routes = Router::new()
        .route("/control/restart/:kind", post(control_restart))
        .route("/control/slots", get(control_slots))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_key_auth))
        .route_layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let status_routes = Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/health", get(health));

    let metrics_routes = match metrics_handle {
        Some(handle) if state.config.metrics_enabled => {
            Router::new().route("/metrics", get(move || async move { handle.render() }))
        }
        _ => Router::new(),
    };

    Router::new()
        .merge(status_routes)
        .merge(control_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
