//! Read-only snapshot exposed by the status surface.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;
use crate::cycle::{CycleKind, CyclePhase, CycleRecord, CycleStatus};

/// Cycles listed on the status page.
pub const RECENT_CYCLES: usize = 10;

/// Immutable copy of the orchestrator's state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusSnapshot {
    /// `live`, `shorts` or `channels`.
    pub mode: String,
    pub phase: CyclePhase,
    /// Human readable status line.
    pub status_text: String,
    pub cycle_id: Option<String>,
    pub cycle_started_at: Option<DateTime<Utc>>,
    pub next_cycle_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub concept: Option<String>,
    pub last_error: Option<String>,
    pub fallback_active: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub slots: Vec<SlotStatus>,
    /// Newest first, at most [`RECENT_CYCLES`].
    #[serde(default)]
    pub recent_cycles: Vec<CycleSummary>,
}

impl StatusSnapshot {
    pub fn starting(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            phase: CyclePhase::Idle,
            status_text: "Starting".to_string(),
            cycle_id: None,
            cycle_started_at: None,
            next_cycle_at: None,
            title: None,
            concept: None,
            last_error: None,
            fallback_active: false,
            updated_at: Utc::now(),
            slots: Vec::new(),
            recent_cycles: Vec::new(),
        }
    }

    /// Copy the relevant fields of a cycle record. `last_error` is kept
    /// across cycles until a new error replaces it.
    pub fn apply_record(&mut self, record: &CycleRecord, status_text: impl Into<String>) {
        self.phase = record.phase;
        self.status_text = status_text.into();
        self.cycle_id = Some(record.id.to_string());
        self.cycle_started_at = record.started_at.or(Some(record.created_at));
        if !record.title.is_empty() {
            self.title = Some(record.title.clone());
        }
        if record.concept.is_some() {
            self.concept = record.concept.clone();
        }
        if record.error.is_some() {
            self.last_error = record.error.clone();
        }
        self.fallback_active = record.fallback;
        self.remember(record);
        self.updated_at = Utc::now();
    }

    /// Insert or refresh `record` in the recent-cycles list.
    pub fn remember(&mut self, record: &CycleRecord) {
        let summary = CycleSummary::from(record);
        self.recent_cycles.retain(|c| c.id != summary.id);
        self.recent_cycles.insert(0, summary);
        self.recent_cycles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.recent_cycles.truncate(RECENT_CYCLES);
    }
}

/// Short form of a cycle record for the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CycleSummary {
    pub id: String,
    pub kind: CycleKind,
    pub status: CycleStatus,
    pub title: String,
    pub fallback: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&CycleRecord> for CycleSummary {
    fn from(record: &CycleRecord) -> Self {
        Self {
            id: record.id.to_string(),
            kind: record.kind,
            status: record.status,
            title: record.title.clone(),
            fallback: record.fallback,
            error: record.error.clone(),
            created_at: record.created_at,
            finished_at: record.finished_at,
        }
    }
}

/// One channel slot as shown on the status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SlotStatus {
    pub name: String,
    pub kind: ChannelKind,
    pub active: bool,
    pub broadcast_id: Option<String>,
    pub asset_title: Option<String>,
    pub restarts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub rotate_at: Option<DateTime<Utc>>,
}
