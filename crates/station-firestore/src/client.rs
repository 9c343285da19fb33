//! Firestore REST API client.
//!
//! - Token caching with refresh margin
//! - One transparent retry when the access token expired mid-flight
//! - Exponential backoff with jitter (opt-in per call through [`FirestoreClient::with_retry`])
//! - Tracing spans and request metrics

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;
use crate::token_cache::TokenCache;
use crate::types::{Document, RunQueryRequest, RunQueryResponse, StructuredQuery, Value};

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Usually "(default)".
    pub database_id: String,
    /// REST root, e.g. `https://firestore.googleapis.com/v1`.
    pub endpoint: String,
    /// Set when talking to the emulator, which needs no real credentials.
    pub emulator: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::config_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.trim().is_empty() {
            return Err(FirestoreError::config_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let emulator_host = std::env::var("FIRESTORE_EMULATOR_HOST")
            .ok()
            .filter(|h| !h.is_empty());
        let endpoint = match &emulator_host {
            Some(host) => format!("http://{}/v1", host),
            None => DEFAULT_ENDPOINT.to_string(),
        };

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            endpoint,
            emulator: emulator_host.is_some(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    /// Build a client; service account credentials are required unless
    /// the config points at the emulator.
    pub fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let token_cache = if config.emulator {
            TokenCache::fixed("owner")
        } else {
            TokenCache::new(Self::create_auth_provider()?)
        };
        Self::with_token_cache(config, token_cache)
    }

    pub fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?)
    }

    /// Build a client around an explicit token cache.
    pub fn with_token_cache(config: FirestoreConfig, token_cache: TokenCache) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("station-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = format!(
            "{}/projects/{}/databases/{}/documents",
            config.endpoint.trim_end_matches('/'),
            config.project_id,
            config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(token_cache),
        })
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::config_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::config_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, urlencoding::encode(doc_id))
    }

    /// Send a request, refreshing the token once if it expired.
    async fn send_authorized<F>(&self, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(401, body));
        }

        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build(&token).send().await?)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Write a document, creating it when missing. The stored document is
    /// replaced by `fields`.
    pub async fn upsert_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.document_path(collection, doc_id);
        let body = Document::new(fields);

        self.execute_request("upsert_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(|token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Execute with the configured retry policy.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Run a structured query over top-level collections.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.base_url);
        let request = RunQueryRequest {
            structured_query: query,
        };
        let collection = request
            .structured_query
            .from
            .first()
            .map(|c| c.collection_id.clone())
            .unwrap_or_default();

        self.execute_request("run_query", &collection, None, async {
            let response = self
                .send_authorized(|token| self.http.post(&url).bearer_auth(token).json(&request))
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await?;
                    let responses: Vec<RunQueryResponse> = serde_json::from_str(&body).map_err(|e| {
                        FirestoreError::request_failed(format!(
                            "Failed to parse runQuery response: {} (body prefix: {})",
                            e,
                            body.chars().take(200).collect::<String>()
                        ))
                    })?;

                    Ok(responses.into_iter().filter_map(|r| r.document).collect())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = info_span!(
            "firestore_request",
            operation = %operation,
            collection = %collection,
            doc_id = doc_id.unwrap_or("")
        );

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_secs = start.elapsed().as_secs_f64();

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_secs);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return FirestoreError::RateLimited(retry_after_ms);
        }

        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}
