//! Axum HTTP surface for the broadcast bot.
//!
//! This crate provides:
//! - The HTML status page and JSON status snapshot
//! - Liveness probe and Prometheus metrics
//! - Key-protected, rate-limited channel control endpoints

pub mod config;
pub mod control;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod page;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ApiConfig;
pub use control::ChannelControl;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::serve;
pub use state::AppState;
