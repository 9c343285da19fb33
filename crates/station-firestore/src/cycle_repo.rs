//! Cycle record persistence.
//!
//! Records live at `cycles/{cycle_id}`. Every save replaces the whole
//! document, so the stored copy always matches the orchestrator's view.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use station_models::CycleRecord;
use tracing::{debug, warn};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{fields_to_json, Document, StructuredQuery, Value};

pub const CYCLES_COLLECTION: &str = "cycles";

const TIMESTAMP_FIELDS: [&str; 4] = ["created_at", "started_at", "finished_at", "updated_at"];

#[derive(Clone)]
pub struct CycleRepository {
    client: FirestoreClient,
}

impl CycleRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn save(&self, record: &CycleRecord) -> FirestoreResult<()> {
        let fields = record_to_fields(record)?;
        let id = record.id.as_str();

        self.client
            .with_retry("save_cycle", || {
                self.client
                    .upsert_document(CYCLES_COLLECTION, id, fields.clone())
            })
            .await?;

        debug!(cycle_id = %id, status = %record.status, "Saved cycle record");
        Ok(())
    }

    /// Most recent cycles first.
    pub async fn list_recent(&self, limit: u32) -> FirestoreResult<Vec<CycleRecord>> {
        let limit = limit.clamp(1, 100) as i32;
        let docs = self
            .client
            .with_retry("list_cycles", || {
                let query = StructuredQuery::collection(CYCLES_COLLECTION)
                    .order_desc("created_at")
                    .limit(limit);
                self.client.run_query(query)
            })
            .await?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            match document_to_record(&doc) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    doc = doc.id().unwrap_or("unknown"),
                    error = %e,
                    "Skipping unreadable cycle document"
                ),
            }
        }
        Ok(records)
    }
}

fn record_to_fields(record: &CycleRecord) -> FirestoreResult<HashMap<String, Value>> {
    let json = serde_json::to_value(record)?;
    let serde_json::Value::Object(map) = json else {
        return Err(FirestoreError::invalid_document(
            "cycle record did not serialize to an object",
        ));
    };

    let mut fields: HashMap<String, Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), Value::from_json(v)))
        .collect();

    // Native timestamps keep server-side ordering on created_at correct.
    let stamps: [(&str, Option<DateTime<Utc>>); 4] = [
        ("created_at", Some(record.created_at)),
        ("started_at", record.started_at),
        ("finished_at", record.finished_at),
        ("updated_at", Some(record.updated_at)),
    ];
    for (name, value) in stamps {
        fields.insert(name.to_string(), Value::timestamp(value));
    }

    Ok(fields)
}

fn document_to_record(doc: &Document) -> FirestoreResult<CycleRecord> {
    let mut json = fields_to_json(doc.fields.as_ref());
    if let serde_json::Value::Object(map) = &mut json {
        for name in TIMESTAMP_FIELDS {
            if let Some(serde_json::Value::String(ts)) = map.get(name) {
                // Firestore may return fewer fractional digits than we wrote.
                if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
                    map.insert(
                        name.to_string(),
                        serde_json::Value::String(parsed.with_timezone(&Utc).to_rfc3339()),
                    );
                }
            }
        }
    }

    serde_json::from_value(json).map_err(|e| {
        FirestoreError::invalid_document(format!(
            "{}: {}",
            doc.id().unwrap_or("unknown"),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_models::{CycleKind, CyclePhase, CycleStatus, StreamTarget};

    fn sample_record() -> CycleRecord {
        let mut record = CycleRecord::new(CycleKind::LiveStream);
        record.advance(CyclePhase::GeneratingContent).unwrap();
        record
            .set_content("Rainy Tokyo Nights", "Lofi beats", None, false)
            .unwrap();
        record.advance(CyclePhase::PublishingAsset).unwrap();
        record
            .set_asset("https://cdn.example.com/covers/a.png", Some("covers/a.png".into()))
            .unwrap();
        record.advance(CyclePhase::RegisteringBroadcast).unwrap();
        record
            .attach_target(StreamTarget::new(
                "b-1",
                "s-1",
                "rtmp://a.rtmp.youtube.com/live2",
                "secret-key",
            ))
            .unwrap();
        record
    }

    #[test]
    fn test_record_fields_use_native_timestamps() {
        let record = sample_record();
        let fields = record_to_fields(&record).unwrap();

        assert!(matches!(fields.get("created_at"), Some(Value::TimestampValue(_))));
        assert!(matches!(fields.get("started_at"), Some(Value::NullValue(()))));
        assert_eq!(
            fields.get("status"),
            Some(&Value::StringValue("READY".to_string()))
        );
    }

    #[test]
    fn test_stream_key_is_not_persisted() {
        let record = sample_record();
        let fields = record_to_fields(&record).unwrap();
        let target = fields.get("target").unwrap().to_json();

        assert_eq!(target["broadcast_id"], "b-1");
        assert!(target.get("stream_name").is_none());
    }

    #[test]
    fn test_document_round_trip_preserves_record() {
        let record = sample_record();
        let mut doc = Document::new(record_to_fields(&record).unwrap());
        doc.name = Some(format!("projects/p/databases/(default)/documents/cycles/{}", record.id));

        let restored = document_to_record(&doc).unwrap();
        assert_eq!(restored.id, record.id);
        assert_eq!(restored.status, CycleStatus::Ready);
        assert_eq!(restored.created_at, record.created_at);
        assert_eq!(restored.target.unwrap().stream_name, "");
    }
}
