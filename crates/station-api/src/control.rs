//! Seam between the HTTP layer and the multi-channel orchestrator.

use async_trait::async_trait;
use station_models::{ChannelKind, SlotStatus};

/// Operations the control routes may invoke on running channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelControl: Send + Sync {
    /// Interrupt every active encoder of `kind` so its self-healing policy
    /// restarts it. Returns how many encoders were interrupted.
    async fn restart_kind(&self, kind: ChannelKind) -> usize;

    /// Current view of every slot.
    async fn slots(&self) -> Vec<SlotStatus>;
}
