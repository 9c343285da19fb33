//! Artwork generation through a text-to-image inference API.

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AiConfig;
use crate::error::{AiError, AiResult};

const MODEL_PATH: &str = "v1/inference/stabilityai/sdxl-turbo";
const INFERENCE_STEPS: u32 = 4;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    prompt: &'a str,
    num_inference_steps: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    images: Vec<ImageEntry>,
}

/// Entries are either `{"image_base64": ...}` or a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageEntry {
    Object { image_base64: Option<String> },
    Bare(String),
}

impl ImageEntry {
    fn into_base64(self) -> Option<String> {
        match self {
            ImageEntry::Object { image_base64 } => image_base64,
            ImageEntry::Bare(s) => Some(s),
        }
    }
}

#[derive(Clone)]
pub struct ImageGenerator {
    http: Client,
    api_key: String,
    endpoint: String,
    width: u32,
    height: u32,
}

impl ImageGenerator {
    pub fn new(config: &AiConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_key: config.image_api_key.clone(),
            endpoint: format!("{}/{}", config.image_base_url.trim_end_matches('/'), MODEL_PATH),
            width: config.image_width,
            height: config.image_height,
        })
    }

    /// Generate artwork and return the decoded image bytes.
    pub async fn generate(&self, prompt: &str) -> AiResult<Vec<u8>> {
        info!(
            prompt = %prompt.chars().take(50).collect::<String>(),
            "Requesting artwork"
        );

        let request = InferenceRequest {
            prompt,
            num_inference_steps: INFERENCE_STEPS,
            width: self.width,
            height: self.height,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Upstream {
                service: "image-inference",
                status,
                body,
            });
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| AiError::invalid_response(format!("Failed to parse image response: {}", e)))?;

        let encoded = body
            .images
            .into_iter()
            .next()
            .and_then(ImageEntry::into_base64)
            .filter(|s| !s.is_empty())
            .ok_or(AiError::MissingImage)?;

        decode_image(&encoded)
    }
}

/// Decode base64 image data, tolerating a `data:image/...;base64,` prefix.
pub fn decode_image(encoded: &str) -> AiResult<Vec<u8>> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => encoded,
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AiError::invalid_response(format!("Image is not valid base64: {}", e)))
}
