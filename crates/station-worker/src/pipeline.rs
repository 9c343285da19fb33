//! Collaborator seams used by the orchestrators.
//!
//! The concrete clients live in the provider crates; [`crate::adapters`]
//! binds them to these traits. Tests substitute in-process fakes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use station_media::{ProcessExit, StreamSpec};
use station_models::{CreativeConcept, StreamTarget};
use station_storage::AssetPublisher;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerResult;

/// Text and image generation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_concept(&self) -> WorkerResult<CreativeConcept>;

    /// Raw encoded image bytes for `prompt`.
    async fn generate_artwork(&self, prompt: &str) -> WorkerResult<Vec<u8>>;
}

/// Encoder operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Composite branding onto `raw` and write the cover to `output`.
    async fn brand_cover(&self, raw: Vec<u8>, output: &Path, cancel: &CancellationToken) -> WorkerResult<()>;

    /// Run a duration-bounded stream in `slot` until the encoder exits.
    ///
    /// `started` fires once the encoder is past its startup grace window.
    async fn run_stream(
        &self,
        slot: &str,
        spec: &StreamSpec,
        started: oneshot::Sender<()>,
        cancel: &CancellationToken,
    ) -> WorkerResult<ProcessExit>;

    /// Render a file-destination spec and return the output path.
    async fn render(&self, spec: &StreamSpec, cancel: &CancellationToken) -> WorkerResult<PathBuf>;

    /// Interrupt every active encoder.
    async fn stop_all(&self) -> usize;
}

/// Live events and uploads on the video platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BroadcastRegistrar: Send + Sync {
    /// Exchange the long-lived credential for a fresh access token.
    async fn refresh_credentials(&self) -> WorkerResult<()>;

    async fn create_live_event(
        &self,
        title: &str,
        description: &str,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> WorkerResult<StreamTarget>;

    /// Upload a finished file; returns the video id.
    async fn upload_video(&self, path: &Path, title: &str, description: &str) -> WorkerResult<String>;

    async fn complete_event(&self, broadcast_id: &str) -> WorkerResult<()>;
}

/// Source of background music files.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Local path of a randomly chosen track.
    async fn random_track(&self) -> WorkerResult<PathBuf>;
}

/// Every collaborator a cycle needs.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentGenerator>,
    pub publisher: Arc<dyn AssetPublisher>,
    pub registrar: Arc<dyn BroadcastRegistrar>,
    pub media: Arc<dyn MediaEngine>,
    /// Only used by short cycles.
    pub tracks: Option<Arc<dyn TrackSource>>,
}
