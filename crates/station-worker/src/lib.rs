//! Station worker.
//!
//! Composition root for the broadcast bot:
//! - [`CycleOrchestrator`]: live and short cycles with bounded retries
//! - [`ChannelOrchestrator`]: always-on self-healing channel slots
//! - [`StateRecorder`]: status snapshot and cycle persistence
//!
//! Collaborators are reached through the traits in [`pipeline`] so the
//! orchestrators can be driven with in-process fakes.

pub mod adapters;
pub mod catalog;
pub mod channels;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod recorder;
pub mod retry;
mod shorts;
pub mod temp_file;

pub use adapters::{AiContent, FfmpegEngine, PlaylistTracks, YoutubeRegistrar};
pub use catalog::{AssetCatalog, CentralApiCatalog};
pub use channels::ChannelOrchestrator;
pub use config::{FailurePolicy, RunMode, StateBackend, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::CycleLogger;
pub use orchestrator::{CycleOrchestrator, LIVE_SLOT};
pub use pipeline::{BroadcastRegistrar, Collaborators, ContentGenerator, MediaEngine, TrackSource};
pub use recorder::{CycleStore, FirestoreCycleStore, MemoryCycleStore, StateRecorder};
pub use retry::{retry_fixed, sleep_or_cancel, FixedRetry};
pub use temp_file::TempFile;
