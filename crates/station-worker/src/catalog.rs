//! Central asset catalog used by channel mode.

use std::time::Duration;

use async_trait::async_trait;
use station_models::{ChannelAsset, ChannelKind};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// Source of looped channel assets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Up to `limit` public assets of `kind`.
    async fn fetch(&self, kind: ChannelKind, limit: usize) -> WorkerResult<Vec<ChannelAsset>>;
}

/// `GET {base}/youtube/assets/public?type=<kind>&limit=<n>`.
#[derive(Clone)]
pub struct CentralApiCatalog {
    http: reqwest::Client,
    base_url: String,
}

impl CentralApiCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AssetCatalog for CentralApiCatalog {
    async fn fetch(&self, kind: ChannelKind, limit: usize) -> WorkerResult<Vec<ChannelAsset>> {
        let url = format!("{}/youtube/assets/public", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("type", kind.as_str().to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| WorkerError::catalog(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::catalog(format!("HTTP {status}: {body}")));
        }

        let assets: Vec<ChannelAsset> = response
            .json()
            .await
            .map_err(|e| WorkerError::catalog(format!("invalid asset list: {e}")))?;
        debug!(kind = %kind, count = assets.len(), "Fetched channel assets");
        Ok(assets)
    }
}
