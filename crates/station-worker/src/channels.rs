//! Multi-channel orchestrator.
//!
//! Every slot runs a [`SelfHealingChannel`] fed by a watch channel holding
//! its current [`StreamSpec`]. A periodic maintenance sweep starts slots
//! that are not running and rotates slots older than the rotation interval
//! onto a fresh asset and broadcast. Slots never share state; the slot table
//! is only locked for bookkeeping, never across network calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use station_api::ChannelControl;
use station_media::{AudioInput, ProcessSupervisor, SelfHealingChannel, StreamSpec};
use station_models::{ChannelAsset, ChannelKind, ChannelSlot, MediaSource, SlotStatus, StreamTarget};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::AssetCatalog;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::BroadcastRegistrar;
use crate::recorder::StateRecorder;
use crate::retry::{cancellable, sleep_or_cancel};

/// Appended to every channel broadcast title.
pub const CHANNEL_TITLE_SUFFIX: &str = "🎧 24/7 | Relaxing Sounds to Sleep and Study";

const DEFAULT_CHANNEL_DESCRIPTION: &str =
    "Relaxing ambience streaming 24/7. Put it on while you sleep, study or unwind.";

/// Assets requested per kind on each sweep.
const CATALOG_FETCH_LIMIT: usize = 50;

struct SlotState {
    slot: ChannelSlot,
    spec_tx: Option<watch::Sender<StreamSpec>>,
    restarts: Arc<AtomicU32>,
    broadcast_id: Option<String>,
    asset_title: Option<String>,
    started_at: Option<DateTime<Utc>>,
    task: Option<JoinHandle<u32>>,
}

impl SlotState {
    fn new(slot: ChannelSlot) -> Self {
        Self {
            slot,
            spec_tx: None,
            restarts: Arc::new(AtomicU32::new(0)),
            broadcast_id: None,
            asset_title: None,
            started_at: None,
            task: None,
        }
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

/// Work decided by a sweep for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotAction {
    Start,
    Rotate,
}

/// A freshly registered broadcast ready to be applied to a slot.
struct Prepared {
    spec: StreamSpec,
    broadcast_id: String,
    asset_title: String,
}

pub struct ChannelOrchestrator {
    config: WorkerConfig,
    slots: RwLock<Vec<SlotState>>,
    catalog: Arc<dyn AssetCatalog>,
    registrar: Arc<dyn BroadcastRegistrar>,
    supervisor: ProcessSupervisor,
    recorder: StateRecorder,
}

impl ChannelOrchestrator {
    pub fn new(
        config: WorkerConfig,
        slots: Vec<ChannelSlot>,
        catalog: Arc<dyn AssetCatalog>,
        registrar: Arc<dyn BroadcastRegistrar>,
        supervisor: ProcessSupervisor,
        recorder: StateRecorder,
    ) -> Self {
        Self {
            config,
            slots: RwLock::new(slots.into_iter().map(SlotState::new).collect()),
            catalog,
            registrar,
            supervisor,
            recorder,
        }
    }

    /// Sweep until `cancel` fires, then wait for every slot to wind down.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            slots = self.slots.read().await.len(),
            rotation_hours = self.config.channel_rotation.as_secs() / 3600,
            "Channel orchestrator starting"
        );

        let mut delay = self.config.cycle_start_delay;
        while !sleep_or_cancel(delay, &cancel).await {
            let running = self.maintain(&cancel).await;
            delay = if running == 0 {
                warn!(
                    "No channel could be started, retrying in {}s",
                    self.config.channel_asset_retry.as_secs()
                );
                self.recorder.set_status_text("Waiting for channel assets");
                self.config.channel_asset_retry
            } else {
                self.config.channel_maintenance_interval
            };
        }

        self.shutdown().await;
    }

    /// One maintenance sweep. Returns how many slots are running afterwards.
    pub async fn maintain(&self, cancel: &CancellationToken) -> usize {
        let now = Utc::now();
        let plan: Vec<(usize, ChannelSlot, SlotAction)> = {
            let slots = self.slots.read().await;
            slots
                .iter()
                .enumerate()
                .filter_map(|(idx, state)| {
                    if !state.is_running() {
                        Some((idx, state.slot.clone(), SlotAction::Start))
                    } else if self.rotate_at(state).is_some_and(|at| at <= now) {
                        Some((idx, state.slot.clone(), SlotAction::Rotate))
                    } else {
                        None
                    }
                })
                .collect()
        };

        let mut pools: HashMap<ChannelKind, Vec<ChannelAsset>> = HashMap::new();
        for (idx, slot, action) in plan {
            if cancel.is_cancelled() {
                break;
            }
            if !pools.contains_key(&slot.kind) {
                let assets = match cancellable(cancel, self.catalog.fetch(slot.kind, CATALOG_FETCH_LIMIT)).await {
                    Ok(assets) => assets,
                    Err(e) => {
                        warn!(kind = %slot.kind, error = %e, "Failed to fetch channel assets");
                        Vec::new()
                    }
                };
                pools.insert(slot.kind, assets);
            }

            let Some(asset) = pools.get(&slot.kind).and_then(|assets| pick_asset(slot.kind, assets)) else {
                match action {
                    SlotAction::Start => warn!(slot = %slot.name, "Not enough assets to start slot"),
                    SlotAction::Rotate => {
                        warn!(slot = %slot.name, "No replacement asset, keeping current stream")
                    }
                }
                continue;
            };

            let prepared = match self.prepare(&slot, &asset, cancel).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    warn!(slot = %slot.name, error = %e, "Failed to prepare channel broadcast");
                    continue;
                }
            };

            match action {
                SlotAction::Start => self.launch(idx, prepared, cancel).await,
                SlotAction::Rotate => self.rotate(idx, prepared).await,
            }
        }

        let running = self.slots.read().await.iter().filter(|s| s.is_running()).count();
        let slots = self.slots().await;
        self.recorder
            .set_status_text(format!("Channels: {}/{} live", running, slots.len()));
        self.recorder.update_slots(slots);
        running
    }

    fn rotate_at(&self, state: &SlotState) -> Option<DateTime<Utc>> {
        let rotation = chrono::Duration::from_std(self.config.channel_rotation).ok()?;
        state.started_at.map(|started| started + rotation)
    }

    /// Register a live event for `asset` and build the slot's encoder spec.
    async fn prepare(
        &self,
        slot: &ChannelSlot,
        asset: &ChannelAsset,
        cancel: &CancellationToken,
    ) -> WorkerResult<Prepared> {
        let title = format!("{} {}", asset.title, CHANNEL_TITLE_SUFFIX);
        let description = asset
            .ai_description
            .clone()
            .unwrap_or_else(|| DEFAULT_CHANNEL_DESCRIPTION.to_string());
        let scheduled = Utc::now()
            + chrono::Duration::from_std(self.config.channel_schedule_lead)
                .unwrap_or_else(|_| chrono::Duration::zero());

        cancellable(cancel, self.registrar.refresh_credentials()).await?;
        let target = cancellable(
            cancel,
            self.registrar.create_live_event(&title, &description, Some(scheduled)),
        )
        .await?;
        info!(slot = %slot.name, broadcast_id = %target.broadcast_id, asset = %asset.title, "Channel broadcast created");

        Ok(Prepared {
            spec: self.channel_spec(slot.kind, asset, &target)?,
            broadcast_id: target.broadcast_id,
            asset_title: asset.title.clone(),
        })
    }

    fn channel_spec(&self, kind: ChannelKind, asset: &ChannelAsset, target: &StreamTarget) -> WorkerResult<StreamSpec> {
        let audio = match kind {
            ChannelKind::Rain => {
                let url = asset
                    .audio_url
                    .as_ref()
                    .ok_or_else(|| WorkerError::catalog(format!("rain asset {} has no audio", asset.id)))?;
                AudioInput::Stream(MediaSource::url(url))
            }
            ChannelKind::LofiBackground => {
                let playlist = self
                    .config
                    .lofi_playlist_url
                    .as_ref()
                    .ok_or_else(|| WorkerError::config_error("LOFI_PLAYLIST_URL not set"))?;
                AudioInput::Playlist(MediaSource::url(playlist))
            }
        };

        Ok(StreamSpec::channel(
            MediaSource::url(&asset.video_url),
            audio,
            target.rtmp_url(),
            &self.config.ffmpeg_preset,
            &self.config.video_bitrate,
        ))
    }

    async fn launch(&self, idx: usize, prepared: Prepared, cancel: &CancellationToken) {
        let mut slots = self.slots.write().await;
        let Some(state) = slots.get_mut(idx) else {
            return;
        };

        let (spec_tx, spec_rx) = watch::channel(prepared.spec);
        let channel = SelfHealingChannel::new(
            self.supervisor.clone(),
            state.slot.name.clone(),
            spec_rx,
            self.config.channel_restart_backoff,
        );
        state.restarts = channel.restarts();
        state.task = Some(tokio::spawn(channel.run(cancel.child_token())));
        state.spec_tx = Some(spec_tx);
        state.broadcast_id = Some(prepared.broadcast_id);
        state.asset_title = Some(prepared.asset_title);
        state.started_at = Some(Utc::now());
        info!(slot = %state.slot.name, "Channel started");
    }

    async fn rotate(&self, idx: usize, prepared: Prepared) {
        let (name, previous) = {
            let mut slots = self.slots.write().await;
            let Some(state) = slots.get_mut(idx) else {
                return;
            };
            if let Some(tx) = &state.spec_tx {
                tx.send_replace(prepared.spec);
            }
            state.asset_title = Some(prepared.asset_title);
            state.started_at = Some(Utc::now());
            let previous = state.broadcast_id.replace(prepared.broadcast_id);
            (state.slot.name.clone(), previous)
        };

        self.supervisor.stop_slot(&name).await;
        metrics::record_rotation(&name);
        info!(slot = %name, "Channel rotated to a new broadcast");

        if let Some(old) = previous {
            if let Err(e) = self.registrar.complete_event(&old).await {
                warn!(slot = %name, broadcast_id = %old, error = %e, "Failed to complete previous broadcast");
            }
        }
    }

    async fn shutdown(&self) {
        let tasks: Vec<(String, JoinHandle<u32>)> = {
            let mut slots = self.slots.write().await;
            slots
                .iter_mut()
                .filter_map(|s| s.task.take().map(|t| (s.slot.name.clone(), t)))
                .collect()
        };
        for (name, task) in tasks {
            match task.await {
                Ok(restarts) => info!(slot = %name, restarts, "Channel shut down"),
                Err(e) => warn!(slot = %name, error = %e, "Channel task failed"),
            }
        }
        info!("Channel orchestrator stopped");
    }
}

/// Random asset usable for `kind`. Rain assets need their own audio.
fn pick_asset(kind: ChannelKind, assets: &[ChannelAsset]) -> Option<ChannelAsset> {
    let usable: Vec<&ChannelAsset> = assets
        .iter()
        .filter(|a| kind != ChannelKind::Rain || a.audio_url.is_some())
        .collect();
    usable.choose(&mut rand::rng()).map(|a| (*a).clone())
}

#[async_trait]
impl ChannelControl for ChannelOrchestrator {
    async fn restart_kind(&self, kind: ChannelKind) -> usize {
        let names: Vec<String> = {
            let slots = self.slots.read().await;
            slots
                .iter()
                .filter(|s| s.slot.kind == kind && s.is_running())
                .map(|s| s.slot.name.clone())
                .collect()
        };

        let mut restarted = 0;
        for name in names {
            if self.supervisor.stop_slot(&name).await {
                info!(slot = %name, "Encoder interrupted for restart");
                restarted += 1;
            }
        }
        restarted
    }

    async fn slots(&self) -> Vec<SlotStatus> {
        let slots = self.slots.read().await;
        let mut out = Vec::with_capacity(slots.len());
        for state in slots.iter() {
            out.push(SlotStatus {
                name: state.slot.name.clone(),
                kind: state.slot.kind,
                active: self.supervisor.is_active(&state.slot.name).await,
                broadcast_id: state.broadcast_id.clone(),
                asset_title: state.asset_title.clone(),
                restarts: state.restarts.load(Ordering::Relaxed),
                started_at: state.started_at,
                rotate_at: self.rotate_at(state),
            });
        }
        out
    }
}
