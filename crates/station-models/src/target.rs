//! Ingest target returned by the broadcast registrar.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Broadcast identifier plus the ingest endpoint an encoder pushes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StreamTarget {
    pub broadcast_id: String,
    pub stream_id: String,
    /// Ingestion address, e.g. `rtmp://a.rtmp.youtube.com/live2`.
    pub ingest_address: String,
    /// Stream key.
    #[serde(default, skip_serializing)]
    #[schemars(skip)]
    pub stream_name: String,
    pub scheduled_start: Option<DateTime<Utc>>,
}

impl StreamTarget {
    pub fn new(
        broadcast_id: impl Into<String>,
        stream_id: impl Into<String>,
        ingest_address: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Self {
        Self {
            broadcast_id: broadcast_id.into(),
            stream_id: stream_id.into(),
            ingest_address: ingest_address.into(),
            stream_name: stream_name.into(),
            scheduled_start: None,
        }
    }

    pub fn with_scheduled_start(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(at);
        self
    }

    /// Full RTMP URL: address + `/` + key.
    pub fn rtmp_url(&self) -> String {
        format!(
            "{}/{}",
            self.ingest_address.trim_end_matches('/'),
            self.stream_name
        )
    }

    /// Reject targets the encoder could never connect to.
    pub fn validate(&self) -> ModelResult<()> {
        let parsed = url::Url::parse(&self.ingest_address)
            .map_err(|e| ModelError::InvalidUrl(format!("{}: {e}", self.ingest_address)))?;
        if !matches!(parsed.scheme(), "rtmp" | "rtmps") {
            return Err(ModelError::InvalidUrl(format!(
                "unsupported ingest scheme: {}",
                parsed.scheme()
            )));
        }
        if self.stream_name.is_empty() {
            return Err(ModelError::validation("stream key is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtmp_url_joins_key() {
        let target = StreamTarget::new("b", "s", "rtmp://a.rtmp.youtube.com/live2/", "abcd-1234");
        assert_eq!(target.rtmp_url(), "rtmp://a.rtmp.youtube.com/live2/abcd-1234");
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_http_and_empty_key() {
        let http = StreamTarget::new("b", "s", "https://example.com", "k");
        assert!(http.validate().is_err());
        let empty = StreamTarget::new("b", "s", "rtmp://x/live2", "");
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_stream_key_not_serialized() {
        let target = StreamTarget::new("b", "s", "rtmp://x/live2", "secret");
        let json = serde_json::to_string(&target).unwrap();
        assert!(!json.contains("secret"));
    }
}
