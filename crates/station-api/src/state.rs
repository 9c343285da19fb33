//! Application state.

use std::sync::Arc;
use std::time::Instant;

use station_models::StatusSnapshot;
use tokio::sync::watch;

use crate::config::ApiConfig;
use crate::control::ChannelControl;

/// Shared application state.
///
/// The HTTP layer only ever reads the snapshot; the orchestrator owns the sender.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub status: watch::Receiver<StatusSnapshot>,
    /// Present only in multi-channel mode.
    pub control: Option<Arc<dyn ChannelControl>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ApiConfig, status: watch::Receiver<StatusSnapshot>) -> Self {
        Self {
            config,
            status,
            control: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_control(mut self, control: Arc<dyn ChannelControl>) -> Self {
        self.control = Some(control);
        self
    }

    /// Immutable copy of the latest snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    pub fn uptime_minutes(&self) -> u64 {
        self.started_at.elapsed().as_secs() / 60
    }
}
