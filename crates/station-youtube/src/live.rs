//! Live events: broadcast + stream + bind, and broadcast completion.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use station_models::StreamTarget;
use tracing::info;

use crate::client::YoutubeClient;
use crate::error::{YoutubeError, YoutubeResult};

const BROADCAST_TITLE_LIMIT: usize = 100;

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, Clone)]
pub struct LiveEventRequest {
    pub title: String,
    pub description: String,
    /// Defaults to now.
    pub scheduled_start: Option<DateTime<Utc>>,
}

impl LiveEventRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            scheduled_start: None,
        }
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(at);
        self
    }
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamResource {
    id: String,
    cdn: Cdn,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cdn {
    ingestion_info: IngestionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionInfo {
    ingestion_address: String,
    stream_name: String,
}

impl YoutubeClient {
    /// Create a broadcast that starts and stops with the encoder, a
    /// variable-resolution RTMP stream, and bind them.
    pub async fn create_live_event(&self, request: &LiveEventRequest) -> YoutubeResult<StreamTarget> {
        let scheduled_start = request.scheduled_start.unwrap_or_else(Utc::now);
        let title = truncate_chars(&request.title, BROADCAST_TITLE_LIMIT);

        let broadcast_body = json!({
            "snippet": {
                "title": title,
                "description": request.description,
                "scheduledStartTime": scheduled_start.to_rfc3339(),
            },
            "status": {
                "privacyStatus": self.privacy_status,
                "selfDeclaredMadeForKids": false,
            },
            "contentDetails": {
                "enableAutoStart": true,
                "enableAutoStop": true,
                "enableDvr": true,
                "latencyPreference": "normal",
                "closedCaptionsType": "closedCaptionsDisabled",
            }
        });

        let broadcast: Resource = self
            .send_json(
                "liveBroadcasts.insert",
                self.http
                    .post(self.api_url("liveBroadcasts"))
                    .query(&[("part", "snippet,status,contentDetails")])
                    .json(&broadcast_body),
            )
            .await?;
        info!(broadcast_id = %broadcast.id, "Broadcast created");

        let stream_body = json!({
            "snippet": {"title": format!("Key para: {}...", truncate_chars(&request.title, 20))},
            "cdn": {
                "ingestionType": "rtmp",
                "resolution": "variable",
                "frameRate": "variable",
            }
        });

        let stream: LiveStreamResource = self
            .send_json(
                "liveStreams.insert",
                self.http
                    .post(self.api_url("liveStreams"))
                    .query(&[("part", "snippet,cdn")])
                    .json(&stream_body),
            )
            .await?;

        self.send(
            "liveBroadcasts.bind",
            self.http.post(self.api_url("liveBroadcasts/bind")).query(&[
                ("id", broadcast.id.as_str()),
                ("streamId", stream.id.as_str()),
                ("part", "id,contentDetails"),
            ]),
        )
        .await?;
        info!(broadcast_id = %broadcast.id, stream_id = %stream.id, "Broadcast bound to stream");

        let target = StreamTarget::new(
            broadcast.id,
            stream.id,
            stream.cdn.ingestion_info.ingestion_address,
            stream.cdn.ingestion_info.stream_name,
        )
        .with_scheduled_start(scheduled_start);

        target
            .validate()
            .map_err(|e| YoutubeError::invalid_response("liveStreams.insert", e.to_string()))?;
        Ok(target)
    }

    /// Transition a broadcast to `complete`.
    pub async fn complete_broadcast(&self, broadcast_id: &str) -> YoutubeResult<()> {
        self.send(
            "liveBroadcasts.transition",
            self.http.post(self.api_url("liveBroadcasts/transition")).query(&[
                ("broadcastStatus", "complete"),
                ("id", broadcast_id),
                ("part", "status"),
            ]),
        )
        .await?;
        info!(broadcast_id = %broadcast_id, "Broadcast completed");
        Ok(())
    }
}
