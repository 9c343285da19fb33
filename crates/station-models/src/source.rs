//! Media inputs handed to the encoder.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An encoder input: either a network URL or a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MediaSource {
    Url(String),
    Path(PathBuf),
}

impl MediaSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    /// String form passed after `-i`.
    pub fn as_input(&self) -> String {
        match self {
            MediaSource::Url(url) => url.clone(),
            MediaSource::Path(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// HTTP(S) sources get reconnect flags.
    pub fn is_network(&self) -> bool {
        match self {
            MediaSource::Url(url) => url.starts_with("http://") || url.starts_with("https://"),
            MediaSource::Path(_) => false,
        }
    }
}

impl From<&Path> for MediaSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_detection() {
        assert!(MediaSource::url("https://cdn.example.com/a.mp3").is_network());
        assert!(!MediaSource::url("rtmp://ingest/live").is_network());
        assert!(!MediaSource::path("/tmp/a.png").is_network());
        assert_eq!(MediaSource::path("/tmp/a.png").as_input(), "/tmp/a.png");
    }
}
