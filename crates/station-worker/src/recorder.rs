//! State recorder.
//!
//! The orchestrator owns the live [`StatusSnapshot`]; readers only ever see
//! immutable copies published through a `watch` channel. Cycle records are
//! additionally written to a [`CycleStore`] on a best-effort basis.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use station_firestore::CycleRepository;
use station_models::{CycleRecord, SlotStatus, StatusSnapshot, RECENT_CYCLES};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::WorkerResult;

/// Records kept by [`MemoryCycleStore`].
pub const MEMORY_HISTORY: usize = 50;

/// Persistence for cycle records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CycleStore: Send + Sync {
    /// Insert or replace the record with the same id.
    async fn save(&self, record: &CycleRecord) -> WorkerResult<()>;

    /// Most recent records, newest first.
    async fn recent(&self, limit: usize) -> WorkerResult<Vec<CycleRecord>>;
}

/// Process-local ring of the last [`MEMORY_HISTORY`] records.
#[derive(Default)]
pub struct MemoryCycleStore {
    records: Mutex<VecDeque<CycleRecord>>,
}

impl MemoryCycleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CycleStore for MemoryCycleStore {
    async fn save(&self, record: &CycleRecord) -> WorkerResult<()> {
        let mut records = self.records.lock().await;
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
            return Ok(());
        }
        records.push_front(record.clone());
        records.truncate(MEMORY_HISTORY);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> WorkerResult<Vec<CycleRecord>> {
        let records = self.records.lock().await;
        Ok(records.iter().take(limit).cloned().collect())
    }
}

/// `cycles/{id}` documents in Firestore.
pub struct FirestoreCycleStore {
    repo: CycleRepository,
}

impl FirestoreCycleStore {
    pub fn new(repo: CycleRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CycleStore for FirestoreCycleStore {
    async fn save(&self, record: &CycleRecord) -> WorkerResult<()> {
        Ok(self.repo.save(record).await?)
    }

    async fn recent(&self, limit: usize) -> WorkerResult<Vec<CycleRecord>> {
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        Ok(self.repo.list_recent(limit).await?)
    }
}

/// Owner of the status snapshot and writer to the cycle store.
#[derive(Clone)]
pub struct StateRecorder {
    status: watch::Sender<StatusSnapshot>,
    store: Arc<dyn CycleStore>,
}

impl StateRecorder {
    /// Create a recorder and the receiver handed to the status server.
    pub fn new(mode: &str, store: Arc<dyn CycleStore>) -> (Self, watch::Receiver<StatusSnapshot>) {
        let (status, rx) = watch::channel(StatusSnapshot::starting(mode));
        (Self { status, store }, rx)
    }

    /// Seed the recent-cycles list from the store, so history survives a
    /// restart when the store is persistent. Failures are logged.
    pub async fn load_history(&self) {
        match self.store.recent(RECENT_CYCLES).await {
            Ok(records) => {
                let count = records.len();
                self.status.send_modify(|snapshot| {
                    for record in records.iter().rev() {
                        snapshot.remember(record);
                    }
                });
                debug!(count, "Loaded cycle history");
            }
            Err(e) => warn!(error = %e, "Failed to load cycle history"),
        }
    }

    /// Publish `record` to the snapshot and persist it.
    ///
    /// Persistence failures are logged and swallowed.
    pub async fn record(&self, record: &CycleRecord, status_text: impl Into<String>) {
        let status_text = status_text.into();
        self.status.send_modify(|snapshot| snapshot.apply_record(record, status_text));

        match self.store.save(record).await {
            Ok(()) => debug!(cycle_id = %record.id, phase = %record.phase, "Cycle record saved"),
            Err(e) => warn!(cycle_id = %record.id, error = %e, "Failed to persist cycle record"),
        }
    }

    pub fn set_status_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.status.send_modify(|snapshot| {
            snapshot.status_text = text;
            snapshot.updated_at = Utc::now();
        });
    }

    pub fn set_next_cycle(&self, at: Option<DateTime<Utc>>) {
        self.status.send_modify(|snapshot| {
            snapshot.next_cycle_at = at;
            snapshot.updated_at = Utc::now();
        });
    }

    pub fn update_slots(&self, slots: Vec<SlotStatus>) {
        self.status.send_modify(|snapshot| {
            snapshot.slots = slots;
            snapshot.updated_at = Utc::now();
        });
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use station_models::{CycleKind, CyclePhase};

    #[tokio::test]
    async fn test_memory_store_upserts_and_caps() {
        let store = MemoryCycleStore::new();
        let mut first = CycleRecord::new(CycleKind::LiveStream);
        store.save(&first).await.unwrap();
        first.advance(CyclePhase::GeneratingContent).unwrap();
        store.save(&first).await.unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].phase, CyclePhase::GeneratingContent);

        for _ in 0..MEMORY_HISTORY + 5 {
            store.save(&CycleRecord::new(CycleKind::Short)).await.unwrap();
        }
        assert_eq!(store.recent(usize::MAX).await.unwrap().len(), MEMORY_HISTORY);
    }

    #[tokio::test]
    async fn test_record_survives_store_failure() {
        let mut store = MockCycleStore::new();
        store
            .expect_save()
            .times(1)
            .returning(|_| Err(WorkerError::Persistence("unavailable".into())));

        let (recorder, rx) = StateRecorder::new("live", Arc::new(store));
        let mut record = CycleRecord::new(CycleKind::LiveStream);
        record.fail("PublishError: Publish failed: 503").unwrap();

        recorder.record(&record, "Error").await;

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.phase, CyclePhase::Error);
        assert_eq!(snapshot.status_text, "Error");
        assert_eq!(snapshot.last_error.as_deref(), Some("PublishError: Publish failed: 503"));
    }

    #[tokio::test]
    async fn test_snapshot_updates_are_visible_to_receivers() {
        let (recorder, rx) = StateRecorder::new("channels", Arc::new(MemoryCycleStore::new()));
        let next = Utc::now();
        recorder.set_next_cycle(Some(next));
        recorder.set_status_text("Waiting for assets");

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.next_cycle_at, Some(next));
        assert_eq!(snapshot.status_text, "Waiting for assets");
        assert_eq!(recorder.snapshot().mode, "channels");
    }

    #[tokio::test]
    async fn test_history_is_loaded_from_store() {
        let store = Arc::new(MemoryCycleStore::new());
        let mut older = CycleRecord::new(CycleKind::LiveStream);
        older.fail("GenerationError: upstream down").unwrap();
        store.save(&older).await.unwrap();
        let newer = CycleRecord::new(CycleKind::LiveStream);
        store.save(&newer).await.unwrap();

        let (recorder, rx) = StateRecorder::new("live", store);
        recorder.load_history().await;

        let history = rx.borrow().recent_cycles.clone();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, newer.id.as_str());
        assert_eq!(history[1].error.as_deref(), Some("GenerationError: upstream down"));
    }

    #[tokio::test]
    async fn test_history_load_failure_is_ignored() {
        let mut store = MockCycleStore::new();
        store
            .expect_recent()
            .times(1)
            .returning(|_| Err(WorkerError::Persistence("unavailable".into())));

        let (recorder, rx) = StateRecorder::new("live", Arc::new(store));
        recorder.load_history().await;
        assert!(rx.borrow().recent_cycles.is_empty());
    }
}
