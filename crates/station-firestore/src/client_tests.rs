//! Tests for Firestore client functionality.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use station_models::{CycleKind, CycleRecord};

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::cycle_repo::CycleRepository;
use crate::error::FirestoreError;
use crate::retry::RetryConfig;
use crate::token_cache::TokenCache;
use crate::types::Value;

const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";

fn test_config(endpoint: &str) -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        endpoint: format!("{}/v1", endpoint),
        emulator: true,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
    }
}

async fn test_client(server: &MockServer) -> FirestoreClient {
    FirestoreClient::with_token_cache(test_config(&server.uri()), TokenCache::fixed("test-token"))
        .unwrap()
}

#[test]
fn test_error_from_http_status() {
    assert!(matches!(
        FirestoreError::from_http_status(429, "slow down"),
        FirestoreError::RateLimited(_)
    ));
    assert!(FirestoreError::from_http_status(503, "unavailable").is_retryable());
    assert!(!FirestoreError::from_http_status(400, "bad request").is_retryable());
    assert!(!FirestoreError::from_http_status(403, "denied").is_retryable());
}

#[test]
#[serial]
fn test_config_requires_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    assert!(matches!(
        FirestoreConfig::from_env(),
        Err(FirestoreError::ConfigError(_))
    ));
}

#[test]
#[serial]
fn test_config_emulator_host() {
    std::env::set_var("GCP_PROJECT_ID", "station");
    std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8081");
    let config = FirestoreConfig::from_env().unwrap();
    std::env::remove_var("FIRESTORE_EMULATOR_HOST");
    std::env::remove_var("GCP_PROJECT_ID");

    assert!(config.emulator);
    assert_eq!(config.endpoint, "http://localhost:8081/v1");
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
}

#[tokio::test]
async fn test_upsert_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/cycles/c1", DOCS)))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"fields": {"title": {"stringValue": "Rain"}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/databases/(default)/documents/cycles/c1",
            "fields": {"title": {"stringValue": "Rain"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let fields = HashMap::from([("title".to_string(), Value::StringValue("Rain".into()))]);
    let doc = client.upsert_document("cycles", "c1", fields).await.unwrap();
    assert_eq!(doc.id(), Some("c1"));
}

#[tokio::test]
async fn test_unauthenticated_without_expiry_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let err = client
        .upsert_document("cycles", "c1", HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::AuthError(_)));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error": {"status": "UNAUTHENTICATED", "message": "ACCESS_TOKEN_EXPIRED"}}"#),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"readTime": "2026-10-15T12:00:00Z"}])))
        .expect(1)
        .mount(&server)
        .await;

    let repo = CycleRepository::new(test_client(&server).await);
    assert!(repo.list_recent(5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_permission_denied_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(403).set_body_string("missing role"))
        .expect(1)
        .mount(&server)
        .await;

    let repo = CycleRepository::new(test_client(&server).await);
    let err = repo
        .save(&CycleRecord::new(CycleKind::LiveStream))
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_repository_save_retries_server_errors() {
    let server = MockServer::start().await;
    let record = CycleRecord::new(CycleKind::LiveStream);
    let doc_path = format!("{}/cycles/{}", DOCS, record.id);

    Mock::given(method("PATCH"))
        .and(path(doc_path.clone()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(doc_path))
        .and(body_partial_json(json!({
            "fields": {"status": {"stringValue": "PREPARING"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fields": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let repo = CycleRepository::new(test_client(&server).await);
    repo.save(&record).await.unwrap();
}

#[tokio::test]
async fn test_repository_list_recent_skips_bad_documents() {
    let server = MockServer::start().await;
    let record = CycleRecord::new(CycleKind::Short);
    let good = serde_json::to_value(&record).unwrap();
    let good_fields: serde_json::Map<String, serde_json::Value> = good
        .as_object()
        .unwrap()
        .iter()
        .map(|(k, v)| {
            (
                k.clone(),
                serde_json::to_value(Value::from_json(v)).unwrap(),
            )
        })
        .collect();

    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .and(body_partial_json(json!({
            "structuredQuery": {"from": [{"collectionId": "cycles"}], "limit": 10}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": {"name": format!("x/cycles/{}", record.id), "fields": good_fields}},
            {"document": {"name": "x/cycles/broken", "fields": {"id": {"integerValue": "1"}}}},
            {"readTime": "2026-10-15T12:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let repo = CycleRepository::new(test_client(&server).await);
    let records = repo.list_recent(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);
    assert_eq!(records[0].kind, CycleKind::Short);
}
