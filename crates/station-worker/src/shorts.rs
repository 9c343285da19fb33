//! Short-video cycles.
//!
//! Same state machine as a live cycle with `STREAMING` skipped:
//! GENERATING_CONTENT builds the cover, PUBLISHING_ASSET renders the MP4 and
//! uploads it to storage, REGISTERING_BROADCAST uploads the file to the video
//! platform. The rendered MP4 and the cover never outlive the cycle.

use station_media::StreamSpec;
use station_models::{CyclePhase, CycleRecord};
use tokio_util::sync::CancellationToken;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::CycleLogger;
use crate::orchestrator::CycleOrchestrator;
use crate::retry::cancellable;
use crate::temp_file::TempFile;

impl CycleOrchestrator {
    pub(crate) async fn short_phases(
        &self,
        record: &mut CycleRecord,
        logger: &CycleLogger,
        cancel: &CancellationToken,
    ) -> WorkerResult<()> {
        let tracks = self
            .collaborators
            .tracks
            .clone()
            .ok_or_else(|| WorkerError::config_error("shorts mode needs a track source"))?;

        record.advance(CyclePhase::GeneratingContent)?;
        self.recorder.record(record, "Generating content").await;
        let content = self.acquire_content(record, logger, cancel).await?;
        let (cover_path, cover_guard) = self.cover_source(content);

        record.advance(CyclePhase::PublishingAsset)?;
        self.recorder.record(record, "Rendering short").await;
        let track = cancellable(cancel, tracks.random_track()).await?;
        if let Some(name) = track.file_name() {
            record.set_music_track(name.to_string_lossy())?;
        }

        let file_name = format!("short_{}.mp4", record.id);
        let output = TempFile::new(self.config.work_dir.join(&file_name));
        let spec = StreamSpec::short(&cover_path, &track, output.path(), self.config.short_duration)
            .with_font(self.config.branding_font_path.clone());
        let rendered = self.collaborators.media.render(&spec, cancel).await;
        if let Some(cover) = cover_guard {
            cover.remove().await;
        }
        let rendered = rendered?;
        logger.log_progress(&format!("short rendered to {}", rendered.display()));

        let published = cancellable(cancel, async {
            Ok(self.collaborators.publisher.publish(&rendered, &file_name).await?)
        })
        .await?;
        record.set_asset(published.url, Some(published.storage_path))?;

        record.advance(CyclePhase::RegisteringBroadcast)?;
        if self.config.short_upload_enabled {
            self.recorder.record(record, "Uploading short").await;
            let registrar = &self.collaborators.registrar;
            cancellable(cancel, registrar.refresh_credentials()).await?;
            let video_id = cancellable(
                cancel,
                registrar.upload_video(&rendered, &record.title, &record.description),
            )
            .await?;
            logger.log_progress(&format!("short uploaded as {}", video_id));
            record.set_video_id(video_id)?;
        } else {
            logger.log_progress("upload disabled, skipping video platform");
        }

        output.remove().await;
        record.finish()?;
        Ok(())
    }
}
