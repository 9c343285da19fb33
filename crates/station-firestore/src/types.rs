//! Firestore REST API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// Firestore sends integers as strings.
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Value>>,
}

impl Value {
    /// Convert a JSON value into the Firestore representation.
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::NullValue(()),
            Json::Bool(b) => Value::BooleanValue(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::IntegerValue(i.to_string()),
                None => Value::DoubleValue(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::StringValue(s.clone()),
            Json::Array(items) => Value::ArrayValue(ArrayValue {
                values: Some(items.iter().map(Value::from_json).collect()),
            }),
            Json::Object(map) => Value::MapValue(MapValue {
                fields: Some(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect(),
                ),
            }),
        }
    }

    /// Native timestamp, or null when unset.
    pub fn timestamp(at: Option<DateTime<Utc>>) -> Self {
        match at {
            Some(at) => Value::TimestampValue(at.to_rfc3339()),
            None => Value::NullValue(()),
        }
    }

    /// Convert back to JSON. Timestamps become RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::NullValue(()) => Json::Null,
            Value::BooleanValue(b) => Json::Bool(*b),
            Value::IntegerValue(s) => s
                .parse::<i64>()
                .map(Json::from)
                .unwrap_or_else(|_| Json::String(s.clone())),
            Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::TimestampValue(s) | Value::StringValue(s) => Json::String(s.clone()),
            Value::ArrayValue(arr) => Json::Array(
                arr.values
                    .iter()
                    .flatten()
                    .map(Value::to_json)
                    .collect(),
            ),
            Value::MapValue(map) => fields_to_json(map.fields.as_ref()),
        }
    }
}

/// Convert a document field map into a JSON object.
pub fn fields_to_json(fields: Option<&HashMap<String, Value>>) -> serde_json::Value {
    let object = fields
        .into_iter()
        .flatten()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::Value::Object(object)
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Last path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }
}

// ============================================================================
// Structured queries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<Order>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

impl StructuredQuery {
    /// Query every document of one collection.
    pub fn collection(collection_id: impl Into<String>) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: collection_id.into(),
            }],
            order_by: None,
            limit: None,
        }
    }

    pub fn order_desc(mut self, field_path: impl Into<String>) -> Self {
        self.order_by.get_or_insert_with(Vec::new).push(Order {
            field: FieldReference {
                field_path: field_path.into(),
            },
            direction: "DESCENDING".to_string(),
        });
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub field: FieldReference,
    pub direction: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

/// One element of the runQuery response stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_wire_format() {
        let v = Value::IntegerValue("42".into());
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({"integerValue": "42"}));

        let null = Value::NullValue(());
        assert_eq!(serde_json::to_value(&null).unwrap(), json!({"nullValue": null}));
    }

    #[test]
    fn test_nested_json_conversion() {
        let source = json!({
            "title": "Rainy night",
            "fallback": false,
            "attempts": 3,
            "target": {"broadcast_id": "b1", "scheduled_start": null},
            "tags": ["lofi", "rain"]
        });

        let value = Value::from_json(&source);
        assert!(matches!(value, Value::MapValue(_)));
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn test_timestamp_value() {
        let at = DateTime::parse_from_rfc3339("2026-10-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            serde_json::to_value(Value::timestamp(Some(at))).unwrap(),
            json!({"timestampValue": "2026-10-15T12:00:00+00:00"})
        );
        assert_eq!(Value::timestamp(None), Value::NullValue(()));
    }

    #[test]
    fn test_query_builder_serializes_camel_case() {
        let q = StructuredQuery::collection("cycles")
            .order_desc("created_at")
            .limit(5);
        let body = serde_json::to_value(RunQueryRequest { structured_query: q }).unwrap();
        assert_eq!(body["structuredQuery"]["from"][0]["collectionId"], "cycles");
        assert_eq!(body["structuredQuery"]["orderBy"][0]["direction"], "DESCENDING");
        assert_eq!(body["structuredQuery"]["limit"], 5);
    }

    #[test]
    fn test_document_id_from_name() {
        let mut doc = Document::new(HashMap::new());
        doc.name = Some("projects/p/databases/(default)/documents/cycles/abc".into());
        assert_eq!(doc.id(), Some("abc"));
    }
}
