//! Bunny storage zone client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::publisher::{content_type, object_key, AssetPublisher, PublishedAsset};

/// Configuration for the Bunny client.
#[derive(Debug, Clone)]
pub struct BunnyConfig {
    pub storage_zone: String,
    pub api_key: String,
    /// Public pull zone base URL, without trailing slash.
    pub pull_zone: String,
    /// Storage API base, `https://{region}` by default.
    pub endpoint: String,
}

impl BunnyConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let region =
            std::env::var("BUNNY_REGION").unwrap_or_else(|_| "storage.bunnycdn.com".to_string());
        Ok(Self::new(
            std::env::var("BUNNY_STORAGE_ZONE")
                .map_err(|_| StorageError::config_error("BUNNY_STORAGE_ZONE not set"))?,
            std::env::var("BUNNY_API_KEY")
                .map_err(|_| StorageError::config_error("BUNNY_API_KEY not set"))?,
            std::env::var("BUNNY_PULL_ZONE")
                .map_err(|_| StorageError::config_error("BUNNY_PULL_ZONE not set"))?,
            format!("https://{region}"),
        ))
    }

    pub fn new(
        storage_zone: impl Into<String>,
        api_key: impl Into<String>,
        pull_zone: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            storage_zone: storage_zone.into(),
            api_key: api_key.into(),
            pull_zone: pull_zone.into().trim_end_matches('/').to_string(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Uploads to a Bunny storage zone over its HTTP API.
#[derive(Clone)]
pub struct BunnyClient {
    http: reqwest::Client,
    config: BunnyConfig,
}

impl BunnyClient {
    pub fn new(config: BunnyConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    fn object_url(&self, storage_path: &str) -> String {
        let encoded: Vec<String> = storage_path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}/{}",
            self.config.endpoint,
            self.config.storage_zone,
            encoded.join("/")
        )
    }
}

#[async_trait]
impl AssetPublisher for BunnyClient {
    async fn publish(&self, local: &Path, dest_name: &str) -> StorageResult<PublishedAsset> {
        let key = object_key(dest_name)?;
        let body = tokio::fs::read(local).await?;
        debug!("Uploading {} ({} bytes) to bunny:{}", local.display(), body.len(), key);

        let response = self
            .http
            .put(self.object_url(&key))
            .header("AccessKey", &self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type(dest_name))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed("bunny", &key, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed("bunny", &key, format!("HTTP {status}: {text}")));
        }

        let url = format!("{}/{}", self.config.pull_zone, key);
        info!(url = %url, "Uploaded to bunny");
        Ok(PublishedAsset {
            url,
            storage_path: key,
        })
    }

    async fn delete(&self, storage_path: &str) -> StorageResult<()> {
        let response = self
            .http
            .delete(self.object_url(storage_path))
            .header("AccessKey", &self.config.api_key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed("bunny", storage_path, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::delete_failed("bunny", storage_path, format!("HTTP {status}")));
        }
        info!(storage_path, "Deleted from bunny");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "bunny"
    }
}
