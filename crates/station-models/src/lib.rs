//! Shared data models for the broadcast bot.
//!
//! This crate provides:
//! - Cycle records and the per-cycle phase state machine
//! - Creative concepts produced by the text generator
//! - Ingest targets returned by the broadcast registrar
//! - Channel slots and catalog assets for multi-channel mode
//! - The read-only status snapshot served by the status endpoint

pub mod channel;
pub mod content;
pub mod cycle;
pub mod error;
pub mod source;
pub mod status;
pub mod target;

pub use channel::{default_slots, ChannelAsset, ChannelKind, ChannelSlot};
pub use content::{CreativeConcept, FALLBACK_DESCRIPTION, FALLBACK_IMAGE_PROMPT, FALLBACK_TITLE};
pub use cycle::{CycleId, CycleKind, CyclePhase, CycleRecord, CycleStatus};
pub use error::{ModelError, ModelResult};
pub use source::MediaSource;
pub use status::{CycleSummary, SlotStatus, StatusSnapshot, RECENT_CYCLES};
pub use target::StreamTarget;
