//! Cloudflare R2 backend (S3 API).

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::publisher::{content_type, object_key, AssetPublisher, PublishedAsset};

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL objects are served from.
    pub public_url: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| StorageError::config_error(format!("{name} not set")))
        };
        Ok(Self {
            endpoint_url: required("R2_ENDPOINT_URL")?,
            access_key_id: required("R2_ACCESS_KEY_ID")?,
            secret_access_key: required("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url: required("R2_PUBLIC_URL")?.trim_end_matches('/').to_string(),
        })
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_url: String,
}

impl R2Client {
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_url: config.public_url,
        })
    }
}

#[async_trait]
impl AssetPublisher for R2Client {
    async fn publish(&self, local: &Path, dest_name: &str) -> StorageResult<PublishedAsset> {
        let key = object_key(dest_name)?;
        debug!("Uploading {} to r2:{}", local.display(), key);

        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| StorageError::upload_failed("r2", &key, e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(content_type(dest_name))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed("r2", &key, e.to_string()))?;

        let url = format!("{}/{}", self.public_url, key);
        info!(url = %url, "Uploaded to r2");
        Ok(PublishedAsset {
            url,
            storage_path: key,
        })
    }

    async fn delete(&self, storage_path: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(storage_path)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed("r2", storage_path, e.to_string()))?;
        info!(storage_path, "Deleted from r2");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "r2"
    }
}
