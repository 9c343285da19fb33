//! Storage Publisher interface.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bunny::{BunnyClient, BunnyConfig};
use crate::error::{StorageError, StorageResult};
use crate::r2::{R2Client, R2Config};

/// Where a published file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedAsset {
    /// Public download URL.
    pub url: String,
    /// Backend-internal path, used for deletion.
    pub storage_path: String,
}

/// Uploads local files and returns a durable public URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    /// Upload `local` under `dest_name`.
    async fn publish(&self, local: &Path, dest_name: &str) -> StorageResult<PublishedAsset>;

    /// Remove a previously published object.
    async fn delete(&self, storage_path: &str) -> StorageResult<()>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Folder for a destination name: `shorts` for MP4 files, `covers` otherwise.
pub fn asset_folder(dest_name: &str) -> &'static str {
    if dest_name.to_ascii_lowercase().ends_with(".mp4") {
        "shorts"
    } else {
        "covers"
    }
}

pub fn content_type(dest_name: &str) -> &'static str {
    let lower = dest_name.to_ascii_lowercase();
    if lower.ends_with(".mp4") {
        "video/mp4"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// Object key `{folder}/{name}`. Names with path separators are rejected.
pub fn object_key(dest_name: &str) -> StorageResult<String> {
    if dest_name.is_empty() || dest_name.contains('/') || dest_name.contains("..") {
        return Err(StorageError::InvalidKey(dest_name.to_string()));
    }
    Ok(format!("{}/{}", asset_folder(dest_name), dest_name))
}

/// Build the publisher selected by `STORAGE_BACKEND` (`bunny` or `r2`).
///
/// Missing credentials are a configuration error.
pub async fn publisher_from_env() -> StorageResult<Arc<dyn AssetPublisher>> {
    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "bunny".to_string());
    match backend.to_ascii_lowercase().as_str() {
        "bunny" => Ok(Arc::new(BunnyClient::new(BunnyConfig::from_env()?))),
        "r2" => Ok(Arc::new(R2Client::new(R2Config::from_env()?).await?)),
        other => Err(StorageError::config_error(format!(
            "unknown STORAGE_BACKEND: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_folder() {
        assert_eq!(asset_folder("short_1.mp4"), "shorts");
        assert_eq!(asset_folder("cover_1.png"), "covers");
        assert_eq!(asset_folder("cover.MP4"), "shorts");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("a.png").unwrap(), "covers/a.png");
        assert!(object_key("../etc/passwd").is_err());
        assert!(object_key("").is_err());
    }

    #[tokio::test]
    async fn test_mock_publisher() {
        let mut mock = MockAssetPublisher::new();
        mock.expect_publish().times(1).returning(|_, name| {
            Ok(PublishedAsset {
                url: format!("https://cdn.example.com/covers/{name}"),
                storage_path: format!("covers/{name}"),
            })
        });
        let asset = mock.publish(Path::new("/tmp/x.png"), "x.png").await.unwrap();
        assert_eq!(asset.storage_path, "covers/x.png");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_unknown_backend_is_config_error() {
        std::env::set_var("STORAGE_BACKEND", "ftp");
        let result = publisher_from_env().await;
        std::env::remove_var("STORAGE_BACKEND");
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
