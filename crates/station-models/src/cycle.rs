//! Cycle records and the per-cycle phase machine.
//!
//! One [`CycleRecord`] describes one pass of
//! generate -> publish -> register -> stream. The orchestrator owns and
//! mutates it; once the record reaches `FINISHED` or `ERROR` every mutator
//! refuses further changes and the next cycle starts with a fresh record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::target::StreamTarget;

/// Unique identifier for a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CycleId(pub String);

impl CycleId {
    /// Generate a new random cycle ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a cycle produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// A duration-bounded live stream.
    #[default]
    LiveStream,
    /// A rendered short video uploaded as a file.
    Short,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::LiveStream => "live_stream",
            CycleKind::Short => "short",
        }
    }
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted cycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    #[default]
    Preparing,
    /// Ingest target acquired, encoder not yet started.
    Ready,
    Live,
    Finished,
    Error,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Preparing => "PREPARING",
            CycleStatus::Ready => "READY",
            CycleStatus::Live => "LIVE",
            CycleStatus::Finished => "FINISHED",
            CycleStatus::Error => "ERROR",
        }
    }

    /// Terminal statuses seal the record.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleStatus::Finished | CycleStatus::Error)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PREPARING" => Some(CycleStatus::Preparing),
            "READY" => Some(CycleStatus::Ready),
            "LIVE" => Some(CycleStatus::Live),
            "FINISHED" => Some(CycleStatus::Finished),
            "ERROR" => Some(CycleStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator phase within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CyclePhase {
    #[default]
    Idle,
    GeneratingContent,
    PublishingAsset,
    RegisteringBroadcast,
    Streaming,
    Finished,
    Error,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "IDLE",
            CyclePhase::GeneratingContent => "GENERATING_CONTENT",
            CyclePhase::PublishingAsset => "PUBLISHING_ASSET",
            CyclePhase::RegisteringBroadcast => "REGISTERING_BROADCAST",
            CyclePhase::Streaming => "STREAMING",
            CyclePhase::Finished => "FINISHED",
            CyclePhase::Error => "ERROR",
        }
    }

    /// Status persisted while the cycle sits in this phase.
    pub fn status(&self) -> CycleStatus {
        match self {
            CyclePhase::Idle
            | CyclePhase::GeneratingContent
            | CyclePhase::PublishingAsset
            | CyclePhase::RegisteringBroadcast => CycleStatus::Preparing,
            CyclePhase::Streaming => CycleStatus::Live,
            CyclePhase::Finished => CycleStatus::Finished,
            CyclePhase::Error => CycleStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CyclePhase::Finished | CyclePhase::Error)
    }

    /// Check whether `self -> next` is a legal edge.
    ///
    /// Short cycles go straight from `REGISTERING_BROADCAST` to `FINISHED`
    /// because the upload itself is the registration.
    pub fn can_transition_to(&self, next: CyclePhase) -> bool {
        use CyclePhase::*;
        match (self, next) {
            (Finished | Error, Idle) => true,
            (Finished | Error, _) => false,
            (_, Error) => true,
            (Idle, GeneratingContent) => true,
            (GeneratingContent, PublishingAsset) => true,
            (PublishingAsset, RegisteringBroadcast) => true,
            (RegisteringBroadcast, Streaming) => true,
            (RegisteringBroadcast, Finished) => true,
            (Streaming, Finished) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CycleRecord {
    pub id: CycleId,
    pub kind: CycleKind,
    pub phase: CyclePhase,
    pub status: CycleStatus,
    pub title: String,
    pub description: String,
    /// Why the generator picked this theme.
    pub concept: Option<String>,
    /// True when fallback content replaced generated content.
    pub fallback: bool,
    /// Public URL of the published asset (cover image or short video).
    pub asset_url: Option<String>,
    /// Storage-internal path of the published asset.
    pub storage_path: Option<String>,
    pub target: Option<StreamTarget>,
    /// Platform id of an uploaded short.
    pub video_id: Option<String>,
    pub music_track: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CycleRecord {
    /// Create a fresh record in `IDLE` / `PREPARING`.
    pub fn new(kind: CycleKind) -> Self {
        let now = Utc::now();
        Self {
            id: CycleId::new(),
            kind,
            phase: CyclePhase::Idle,
            status: CycleStatus::Preparing,
            title: String::new(),
            description: String::new(),
            concept: None,
            fallback: false,
            asset_url: None,
            storage_path: None,
            target: None,
            video_id: None,
            music_track: None,
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_open(&self) -> ModelResult<()> {
        if self.is_sealed() {
            return Err(ModelError::RecordSealed(self.status));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move to the next phase, updating status and timestamps.
    pub fn advance(&mut self, next: CyclePhase) -> ModelResult<()> {
        self.ensure_open()?;
        if !self.phase.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        self.phase = next;
        self.status = next.status();
        match next {
            CyclePhase::Streaming => self.started_at = Some(Utc::now()),
            CyclePhase::Finished | CyclePhase::Error => self.finished_at = Some(Utc::now()),
            _ => {}
        }
        self.touch();
        Ok(())
    }

    /// Record the creative content chosen for this cycle.
    pub fn set_content(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        concept: Option<String>,
        fallback: bool,
    ) -> ModelResult<()> {
        self.ensure_open()?;
        self.title = title.into();
        self.description = description.into();
        self.concept = concept;
        self.fallback = fallback;
        self.touch();
        Ok(())
    }

    pub fn set_asset(
        &mut self,
        url: impl Into<String>,
        storage_path: Option<String>,
    ) -> ModelResult<()> {
        self.ensure_open()?;
        self.asset_url = Some(url.into());
        self.storage_path = storage_path;
        self.touch();
        Ok(())
    }

    pub fn set_music_track(&mut self, track: impl Into<String>) -> ModelResult<()> {
        self.ensure_open()?;
        self.music_track = Some(track.into());
        self.touch();
        Ok(())
    }

    /// Attach the ingest target; the record becomes `READY`.
    pub fn attach_target(&mut self, target: StreamTarget) -> ModelResult<()> {
        self.ensure_open()?;
        self.target = Some(target);
        self.status = CycleStatus::Ready;
        self.touch();
        Ok(())
    }

    pub fn set_video_id(&mut self, video_id: impl Into<String>) -> ModelResult<()> {
        self.ensure_open()?;
        self.video_id = Some(video_id.into());
        self.touch();
        Ok(())
    }

    /// Mark the record `ERROR` with a message. Sealed records are left untouched.
    pub fn fail(&mut self, message: impl Into<String>) -> ModelResult<()> {
        self.ensure_open()?;
        self.error = Some(message.into());
        self.advance(CyclePhase::Error)
    }

    /// Mark the record `FINISHED`.
    pub fn finish(&mut self) -> ModelResult<()> {
        self.advance(CyclePhase::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> StreamTarget {
        StreamTarget::new("b1", "s1", "rtmp://a.rtmp.youtube.com/live2", "key-1")
    }

    #[test]
    fn test_live_cycle_walks_every_status() {
        let mut record = CycleRecord::new(CycleKind::LiveStream);
        assert_eq!(record.status, CycleStatus::Preparing);

        record.advance(CyclePhase::GeneratingContent).unwrap();
        record.advance(CyclePhase::PublishingAsset).unwrap();
        record.advance(CyclePhase::RegisteringBroadcast).unwrap();
        record.attach_target(target()).unwrap();
        assert_eq!(record.status, CycleStatus::Ready);

        record.advance(CyclePhase::Streaming).unwrap();
        assert_eq!(record.status, CycleStatus::Live);
        assert!(record.started_at.is_some());

        record.finish().unwrap();
        assert_eq!(record.status, CycleStatus::Finished);
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_sealed_record_rejects_mutation() {
        let mut record = CycleRecord::new(CycleKind::LiveStream);
        record.advance(CyclePhase::GeneratingContent).unwrap();
        record.fail("upstream down").unwrap();
        assert_eq!(record.status, CycleStatus::Error);
        assert_eq!(record.error.as_deref(), Some("upstream down"));

        assert!(matches!(
            record.set_content("t", "d", None, false),
            Err(ModelError::RecordSealed(CycleStatus::Error))
        ));
        assert!(record.fail("again").is_err());
        assert_eq!(record.error.as_deref(), Some("upstream down"));
    }

    #[test]
    fn test_phase_cannot_skip_ahead() {
        let mut record = CycleRecord::new(CycleKind::LiveStream);
        let err = record.advance(CyclePhase::Streaming).unwrap_err();
        assert!(matches!(err, ModelError::InvalidTransition { .. }));
        assert_eq!(record.phase, CyclePhase::Idle);
    }

    #[test]
    fn test_short_cycle_finishes_after_registration() {
        assert!(CyclePhase::RegisteringBroadcast.can_transition_to(CyclePhase::Finished));
        assert!(CyclePhase::Finished.can_transition_to(CyclePhase::Idle));
        assert!(!CyclePhase::Error.can_transition_to(CyclePhase::Streaming));
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&CycleStatus::Finished).unwrap();
        assert_eq!(json, "\"FINISHED\"");
        assert_eq!(CycleStatus::parse("LIVE"), Some(CycleStatus::Live));
        assert_eq!(CycleStatus::parse("live"), None);
    }
}
