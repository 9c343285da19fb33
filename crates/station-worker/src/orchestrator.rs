//! Cycle orchestrator.
//!
//! One cycle walks `IDLE -> GENERATING_CONTENT -> PUBLISHING_ASSET ->
//! REGISTERING_BROADCAST -> STREAMING -> FINISHED`. Any error ends the cycle
//! in `ERROR`: the record is persisted best-effort, every encoder is stopped
//! and the loop cools down before starting a fresh cycle. Only cancellation
//! ends the loop.

use std::path::PathBuf;

use chrono::Utc;
use station_media::StreamSpec;
use station_models::{CreativeConcept, CycleKind, CyclePhase, CycleRecord, MediaSource};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::config::{FailurePolicy, RunMode, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::CycleLogger;
use crate::metrics;
use crate::pipeline::Collaborators;
use crate::recorder::StateRecorder;
use crate::retry::{cancellable, retry_fixed, sleep_or_cancel, FixedRetry};
use crate::temp_file::{remove_quietly, TempFile};

/// Supervisor slot used by live cycles.
pub const LIVE_SLOT: &str = "live";

/// Outcome of the content phase.
pub(crate) enum Content {
    /// Generated concept with its branded cover.
    Generated(TempFile),
    /// Fallback concept; the bundled image is used as-is.
    Fallback,
}

pub struct CycleOrchestrator {
    pub(crate) config: WorkerConfig,
    pub(crate) collaborators: Collaborators,
    pub(crate) recorder: StateRecorder,
    kind: CycleKind,
}

impl CycleOrchestrator {
    pub fn new(config: WorkerConfig, collaborators: Collaborators, recorder: StateRecorder) -> Self {
        let kind = match config.mode {
            RunMode::Shorts => CycleKind::Short,
            RunMode::Live | RunMode::Channels => CycleKind::LiveStream,
        };
        Self {
            config,
            collaborators,
            recorder,
            kind,
        }
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self.kind {
            CycleKind::LiveStream => RunMode::Live.as_str(),
            CycleKind::Short => RunMode::Shorts.as_str(),
        }
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            mode = self.mode(),
            cooldown_secs = self.config.cycle_cooldown.as_secs(),
            "Cycle orchestrator starting"
        );

        if !sleep_or_cancel(self.config.cycle_start_delay, &cancel).await {
            loop {
                let record = self.run_cycle(&cancel).await;
                if cancel.is_cancelled() {
                    break;
                }

                let next = Utc::now()
                    + chrono::Duration::from_std(self.config.cycle_cooldown)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                self.recorder.set_next_cycle(Some(next));
                info!(
                    cycle_id = %record.id,
                    status = %record.status,
                    "Cooling down for {}s",
                    self.config.cycle_cooldown.as_secs()
                );

                if sleep_or_cancel(self.config.cycle_cooldown, &cancel).await {
                    break;
                }
                self.recorder.set_next_cycle(None);
            }
        }

        let stopped = self.collaborators.media.stop_all().await;
        info!(stopped, "Cycle orchestrator stopped");
    }

    /// Drive one cycle to `FINISHED` or `ERROR` and return the sealed record.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleRecord {
        let mut record = CycleRecord::new(self.kind);
        let logger = CycleLogger::new(&record.id, self.mode());
        let span = logger.create_span();

        async move {
            logger.log_start(self.kind.as_str());
            remove_quietly(&self.config.cover_path()).await;
            self.recorder.record(&record, "Preparing").await;

            let result = match self.kind {
                CycleKind::LiveStream => self.live_phases(&mut record, &logger, cancel).await,
                CycleKind::Short => self.short_phases(&mut record, &logger, cancel).await,
            };

            match result {
                Ok(()) => {
                    metrics::record_cycle(self.mode(), "finished");
                    logger.log_completion(&record.title);
                    self.recorder.record(&record, "Finished").await;
                }
                Err(e) => self.fail_cycle(&mut record, &logger, e).await,
            }
            if self.kind == CycleKind::LiveStream {
                self.retire_cover(&record, &logger).await;
            }
            record
        }
        .instrument(span)
        .await
    }

    async fn fail_cycle(&self, record: &mut CycleRecord, logger: &CycleLogger, error: WorkerError) {
        let phase = record.phase;
        if error.is_cancelled() {
            logger.log_warning(&format!("cancelled during {}", phase));
        } else {
            logger.log_error(error.kind(), &format!("{} during {}", error, phase));
        }
        metrics::record_phase_failure(phase.as_str(), error.kind());
        metrics::record_cycle(self.mode(), "error");

        if let Err(e) = record.fail(error.describe()) {
            debug!(cycle_id = %record.id, error = %e, "Record already sealed");
        }
        self.recorder.record(record, format!("Error: {}", error.kind())).await;

        let stopped = self.collaborators.media.stop_all().await;
        if stopped > 0 {
            logger.log_warning(&format!("stopped {} encoder(s)", stopped));
        }
    }

    async fn live_phases(
        &self,
        record: &mut CycleRecord,
        logger: &CycleLogger,
        cancel: &CancellationToken,
    ) -> WorkerResult<()> {
        let audio = self
            .config
            .audio_source_url
            .clone()
            .ok_or_else(|| WorkerError::config_error("AUDIO_SOURCE_URL not set"))?;

        record.advance(CyclePhase::GeneratingContent)?;
        self.recorder.record(record, "Generating content").await;
        let content = self.acquire_content(record, logger, cancel).await?;

        record.advance(CyclePhase::PublishingAsset)?;
        self.recorder.record(record, "Publishing asset").await;
        let image = match content {
            Content::Generated(cover) => {
                let dest_name = format!("cover_{}.png", Utc::now().timestamp_millis());
                let published = cancellable(cancel, async {
                    Ok(self.collaborators.publisher.publish(cover.path(), &dest_name).await?)
                })
                .await;
                cover.remove().await;
                let published = published?;
                logger.log_progress(&format!("cover published to {}", published.url));
                record.set_asset(published.url.clone(), Some(published.storage_path))?;
                MediaSource::url(published.url)
            }
            Content::Fallback => {
                let path = &self.config.fallback_image_path;
                record.set_asset(path.display().to_string(), None)?;
                MediaSource::path(path)
            }
        };

        record.advance(CyclePhase::RegisteringBroadcast)?;
        self.recorder.record(record, "Registering broadcast").await;
        let registrar = &self.collaborators.registrar;
        cancellable(cancel, registrar.refresh_credentials()).await?;
        let target = cancellable(
            cancel,
            registrar.create_live_event(&record.title, &record.description, None),
        )
        .await?;
        target
            .validate()
            .map_err(|e| WorkerError::registration(e.to_string()))?;
        let rtmp_url = target.rtmp_url();
        logger.log_progress(&format!("broadcast {} created", target.broadcast_id));
        record.attach_target(target)?;
        self.recorder.record(record, "Ready").await;

        let spec = StreamSpec::live_still(image, MediaSource::url(audio), rtmp_url, self.config.cycle_duration)
            .with_font(self.config.branding_font_path.clone());
        let (started_tx, started_rx) = oneshot::channel();
        let stream = self.collaborators.media.run_stream(LIVE_SLOT, &spec, started_tx, cancel);
        tokio::pin!(stream);

        // LIVE is only recorded once the encoder is past its startup grace.
        let exit = tokio::select! {
            biased;
            Ok(()) = started_rx => {
                self.mark_streaming(record).await?;
                stream.as_mut().await?
            }
            exit = &mut stream => exit?,
        };
        if record.phase != CyclePhase::Streaming {
            self.mark_streaming(record).await?;
        }
        logger.log_progress(&format!("encoder exited with code {:?}", exit.code));

        record.finish()?;
        Ok(())
    }

    async fn mark_streaming(&self, record: &mut CycleRecord) -> WorkerResult<()> {
        record.advance(CyclePhase::Streaming)?;
        self.recorder.record(record, format!("LIVE: {}", record.title)).await;
        Ok(())
    }

    /// Delete the cycle's cover from storage once nothing streams it.
    async fn retire_cover(&self, record: &CycleRecord, logger: &CycleLogger) {
        let Some(storage_path) = record.storage_path.as_deref() else {
            return;
        };
        match self.collaborators.publisher.delete(storage_path).await {
            Ok(()) => debug!(cycle_id = %record.id, storage_path, "Cover deleted from storage"),
            Err(e) => logger.log_warning(&format!("failed to delete cover {}: {}", storage_path, e)),
        }
    }

    /// Generate a concept and a branded cover, retrying the whole step.
    ///
    /// Exhausted retries fall back or fail depending on the failure policy.
    pub(crate) async fn acquire_content(
        &self,
        record: &mut CycleRecord,
        logger: &CycleLogger,
        cancel: &CancellationToken,
    ) -> WorkerResult<Content> {
        let policy = FixedRetry::new(
            "generate_content",
            self.config.generation_max_attempts,
            self.config.generation_retry_delay,
        );
        let cover_path = self.config.cover_path();
        let concept_slot: Mutex<Option<CreativeConcept>> = Mutex::new(None);
        let this = self;
        let known = &concept_slot;

        // A checked concept is kept across attempts; only the artwork and
        // branding steps are repeated once one exists.
        let generated = retry_fixed(&policy, cancel, move |attempt| {
            let cover_path = cover_path.clone();
            async move {
                debug!(attempt, "Generating content");
                let cached = known.lock().await.clone();
                let concept = match cached {
                    Some(concept) => concept,
                    None => {
                        let concept = this
                            .collaborators
                            .content
                            .generate_concept()
                            .await?
                            .checked()
                            .map_err(|e| WorkerError::generation(e.to_string()))?;
                        *known.lock().await = Some(concept.clone());
                        concept
                    }
                };
                let raw = this.collaborators.content.generate_artwork(&concept.image_prompt).await?;

                let cover = TempFile::new(cover_path);
                this.collaborators.media.brand_cover(raw, cover.path(), cancel).await?;
                Ok((concept, cover))
            }
        })
        .await;

        match generated {
            Ok((concept, cover)) => {
                logger.log_progress(&format!("concept ready: {}", concept.title));
                record.set_content(concept.title, concept.description, Some(concept.concept_reasoning), false)?;
                Ok(Content::Generated(cover))
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => match self.config.failure_policy {
                FailurePolicy::Abort => Err(e),
                FailurePolicy::Fallback => {
                    metrics::record_fallback(self.mode());
                    match concept_slot.into_inner() {
                        Some(concept) => {
                            logger.log_warning(&format!("artwork exhausted, using fallback image: {}", e));
                            record.set_content(
                                concept.title,
                                concept.description,
                                Some(concept.concept_reasoning),
                                true,
                            )?;
                        }
                        None => {
                            logger.log_warning(&format!("generation exhausted, using fallback content: {}", e));
                            let fallback = CreativeConcept::fallback();
                            record.set_content(fallback.title, fallback.description, None, true)?;
                        }
                    }
                    Ok(Content::Fallback)
                }
            },
        }
    }

    /// Cover for a short: the generated one (removed by its guard) or the bundled image.
    pub(crate) fn cover_source(&self, content: Content) -> (PathBuf, Option<TempFile>) {
        match content {
            Content::Generated(cover) => (cover.path().to_path_buf(), Some(cover)),
            Content::Fallback => (self.config.fallback_image_path.clone(), None),
        }
    }
}
