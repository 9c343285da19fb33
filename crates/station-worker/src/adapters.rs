//! Bindings from the provider crates to the pipeline traits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use station_ai::{AiConfig, ImageGenerator, TextGenerator};
use station_media::{
    apply_branding, render_to_file, run_bounded, BrandingConfig, ProcessExit, ProcessSupervisor, StreamSpec,
    TrackCache,
};
use station_models::{CreativeConcept, StreamTarget};
use station_youtube::{LiveEventRequest, ShortUpload, YoutubeClient};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerResult;
use crate::pipeline::{BroadcastRegistrar, ContentGenerator, MediaEngine, TrackSource};

/// Text and image endpoints of the asset provider.
pub struct AiContent {
    text: TextGenerator,
    image: ImageGenerator,
}

impl AiContent {
    pub fn new(config: &AiConfig) -> WorkerResult<Self> {
        Ok(Self {
            text: TextGenerator::new(config)?,
            image: ImageGenerator::new(config)?,
        })
    }

    pub fn from_env() -> WorkerResult<Self> {
        Self::new(&AiConfig::from_env()?)
    }
}

#[async_trait]
impl ContentGenerator for AiContent {
    async fn generate_concept(&self) -> WorkerResult<CreativeConcept> {
        Ok(self.text.generate_concept().await?)
    }

    async fn generate_artwork(&self, prompt: &str) -> WorkerResult<Vec<u8>> {
        Ok(self.image.generate(prompt).await?)
    }
}

pub struct YoutubeRegistrar {
    client: YoutubeClient,
}

impl YoutubeRegistrar {
    pub fn new(client: YoutubeClient) -> Self {
        Self { client }
    }

    pub fn from_env() -> WorkerResult<Self> {
        Ok(Self::new(YoutubeClient::from_env()?))
    }
}

#[async_trait]
impl BroadcastRegistrar for YoutubeRegistrar {
    async fn refresh_credentials(&self) -> WorkerResult<()> {
        Ok(self.client.refresh_credentials().await?)
    }

    async fn create_live_event(
        &self,
        title: &str,
        description: &str,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> WorkerResult<StreamTarget> {
        let mut request = LiveEventRequest::new(title, description);
        if let Some(at) = scheduled_at {
            request = request.scheduled_at(at);
        }
        Ok(self.client.create_live_event(&request).await?)
    }

    async fn upload_video(&self, path: &Path, title: &str, description: &str) -> WorkerResult<String> {
        Ok(self.client.upload_short(path, &ShortUpload::new(title, description)).await?)
    }

    async fn complete_event(&self, broadcast_id: &str) -> WorkerResult<()> {
        Ok(self.client.complete_broadcast(broadcast_id).await?)
    }
}

/// FFmpeg-backed media engine sharing one supervisor.
pub struct FfmpegEngine {
    supervisor: ProcessSupervisor,
    branding: BrandingConfig,
    keepalive: Duration,
}

impl FfmpegEngine {
    pub fn new(supervisor: ProcessSupervisor, branding: BrandingConfig, keepalive: Duration) -> Self {
        Self {
            supervisor,
            branding,
            keepalive,
        }
    }

    fn program(&self) -> &str {
        &self.supervisor.config().program
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn brand_cover(&self, raw: Vec<u8>, output: &Path, cancel: &CancellationToken) -> WorkerResult<()> {
        Ok(apply_branding(self.program(), &self.branding, raw, output, cancel).await?)
    }

    async fn run_stream(
        &self,
        slot: &str,
        spec: &StreamSpec,
        started: oneshot::Sender<()>,
        cancel: &CancellationToken,
    ) -> WorkerResult<ProcessExit> {
        Ok(run_bounded(&self.supervisor, slot, spec, cancel, self.keepalive, Some(started)).await?)
    }

    async fn render(&self, spec: &StreamSpec, cancel: &CancellationToken) -> WorkerResult<PathBuf> {
        Ok(render_to_file(self.program(), spec, cancel).await?)
    }

    async fn stop_all(&self) -> usize {
        self.supervisor.stop_all().await
    }
}

/// Random tracks from the ffconcat playlist, cached on disk.
pub struct PlaylistTracks {
    cache: TrackCache,
    playlist_url: String,
}

impl PlaylistTracks {
    pub fn new(cache_dir: impl Into<PathBuf>, playlist_url: impl Into<String>) -> Self {
        Self {
            cache: TrackCache::new(cache_dir),
            playlist_url: playlist_url.into(),
        }
    }
}

#[async_trait]
impl TrackSource for PlaylistTracks {
    async fn random_track(&self) -> WorkerResult<PathBuf> {
        Ok(self.cache.random_track(&self.playlist_url).await?)
    }
}
