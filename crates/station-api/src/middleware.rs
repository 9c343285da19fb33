//! API middleware.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// Header carrying the pre-shared control key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Rate limiter type alias.
pub type ControlRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create the limiter shared by all control routes.
pub fn create_rate_limiter(requests_per_second: u32) -> Arc<ControlRateLimiter> {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    provided.len() == expected.len()
        && provided
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Reject control calls without a matching `x-api-key` header.
pub async fn api_key_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let Some(expected) = state.config.admin_api_key.as_deref() else {
        warn!(uri = %request.uri(), "Control call rejected: no admin key configured");
        return ApiError::forbidden("Control access is disabled").into_response();
    };

    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|provided| keys_match(provided.as_bytes(), expected.as_bytes()))
        .unwrap_or(false);

    if !authorized {
        warn!(uri = %request.uri(), "Control call rejected: bad api key");
        return ApiError::forbidden("Unauthorized access").into_response();
    }

    next.run(request).await
}

/// Rate limiting middleware for control routes.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ControlRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if limiter.check().is_err() {
        warn!(uri = %request.uri(), "Rate limit exceeded");
        metrics::record_rate_limit_hit(request.uri().path());
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

/// Security headers middleware.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));

    response
}

/// Request ID middleware.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(request_id.clone());
    Span::current().record("request_id", &request_id);

    let mut response = next.run(request).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-ID", header_value);
    }

    response
}

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    // Liveness probes poll constantly.
    if uri.path() != "/health" {
        info!(
            method = %method,
            uri = %uri,
            status = %response.status(),
            duration_ms = %start.elapsed().as_millis(),
            "Request completed"
        );
    }

    response
}
