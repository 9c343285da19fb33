//! Resumable video upload for short-form videos.

use std::path::Path;

use reqwest::header::LOCATION;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::client::YoutubeClient;
use crate::error::{YoutubeError, YoutubeResult};
use crate::live::truncate_chars;

const SHORT_TITLE_LIMIT: usize = 90;
const SHORT_TAGS: [&str; 5] = ["lofi", "relax", "shorts", "anime", "chill"];
/// Music.
const SHORT_CATEGORY: &str = "10";

/// Metadata for one short upload.
#[derive(Debug, Clone)]
pub struct ShortUpload {
    pub title: String,
    pub description: String,
}

impl ShortUpload {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Title as published: truncated and tagged `#Shorts`.
    pub fn published_title(&self) -> String {
        format!("{} #Shorts", truncate_chars(&self.title, SHORT_TITLE_LIMIT))
    }
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

impl YoutubeClient {
    /// Upload a local MP4 and return the new video id.
    pub async fn upload_short(&self, path: &Path, upload: &ShortUpload) -> YoutubeResult<String> {
        let bytes = tokio::fs::read(path).await?;

        let metadata = json!({
            "snippet": {
                "title": upload.published_title(),
                "description": upload.description,
                "tags": SHORT_TAGS,
                "categoryId": SHORT_CATEGORY,
            },
            "status": {
                "privacyStatus": self.privacy_status,
                "selfDeclaredMadeForKids": false,
            }
        });

        let initiate = self
            .send(
                "videos.insert",
                self.http
                    .post(format!("{}/upload/youtube/v3/videos", self.api_base_url))
                    .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                    .header("X-Upload-Content-Type", "video/mp4")
                    .header("X-Upload-Content-Length", bytes.len().to_string())
                    .json(&metadata),
            )
            .await?;

        let session_uri = initiate
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| YoutubeError::invalid_response("videos.insert", "no upload session Location header"))?;

        let size = bytes.len();
        let video: VideoResource = self
            .send_json(
                "videos.upload",
                self.http
                    .put(&session_uri)
                    .header(reqwest::header::CONTENT_TYPE, "video/mp4")
                    .body(bytes),
            )
            .await?;

        info!(video_id = %video.id, bytes = size, "Short uploaded");
        Ok(video.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_published_title() {
        let upload = ShortUpload::new("y".repeat(120), "d");
        let title = upload.published_title();
        assert!(title.ends_with(" #Shorts"));
        assert_eq!(title.chars().count(), 90 + " #Shorts".len());
        assert_eq!(ShortUpload::new("Rain", "d").published_title(), "Rain #Shorts");
    }

    #[tokio::test]
    async fn test_upload_short_resumable_flow() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("short.mp4");
        std::fs::write(&file, b"fake-mp4-bytes").unwrap();

        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(query_param("uploadType", "resumable"))
            .and(header("X-Upload-Content-Length", "14"))
            .and(body_partial_json(json!({
                "snippet": {"title": "Rain #Shorts", "categoryId": "10", "tags": ["lofi", "relax", "shorts", "anime", "chill"]}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/upload-session/abc", server.uri()).as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/upload-session/abc"))
            .and(header("content-type", "video/mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "vid-42"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let id = client
            .upload_short(&file, &ShortUpload::new("Rain", "desc"))
            .await
            .unwrap();
        assert_eq!(id, "vid-42");
    }

    #[tokio::test]
    async fn test_missing_location_is_invalid_response() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("short.mp4");
        std::fs::write(&file, b"x").unwrap();

        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .upload_short(&file, &ShortUpload::new("t", "d"))
            .await
            .unwrap_err();
        assert!(matches!(err, YoutubeError::InvalidResponse { operation: "videos.insert", .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let err = client
            .upload_short(Path::new("/nonexistent/short.mp4"), &ShortUpload::new("t", "d"))
            .await
            .unwrap_err();
        assert!(matches!(err, YoutubeError::Io(_)));
    }
}
