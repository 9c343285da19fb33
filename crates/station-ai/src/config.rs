//! Asset provider configuration.

use std::time::Duration;

use crate::error::{AiError, AiResult};

/// Links appended to every generated description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketingLinks {
    pub spotify_url: String,
    pub website_url: String,
}

impl Default for MarketingLinks {
    fn default() -> Self {
        Self {
            spotify_url: "#".to_string(),
            website_url: "https://desderelaxstation.com".to_string(),
        }
    }
}

impl MarketingLinks {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            spotify_url: std::env::var("SPOTIFY_URL").unwrap_or(defaults.spotify_url),
            website_url: std::env::var("WEBSITE_URL").unwrap_or(defaults.website_url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Chat-completions key (DeepSeek)
    pub text_api_key: String,
    pub text_base_url: String,
    pub text_model: String,
    /// Text-to-image key (DeepInfra)
    pub image_api_key: String,
    pub image_base_url: String,
    pub image_width: u32,
    pub image_height: u32,
    pub request_timeout: Duration,
    pub links: MarketingLinks,
}

impl AiConfig {
    pub fn from_env() -> AiResult<Self> {
        let text_api_key = required("DEEPSEEK_API_KEY")?;
        let image_api_key = required("DEEPINFRA_API_KEY")?;

        Ok(Self {
            text_api_key,
            text_base_url: std::env::var("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
            text_model: std::env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
            image_api_key,
            image_base_url: std::env::var("DEEPINFRA_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepinfra.com".to_string()),
            image_width: 1280,
            image_height: 720,
            request_timeout: Duration::from_secs(
                std::env::var("AI_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            links: MarketingLinks::from_env(),
        })
    }

    /// Config pointing both providers at one base URL.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            text_api_key: "test-text-key".to_string(),
            text_base_url: base_url.clone(),
            text_model: "deepseek-chat".to_string(),
            image_api_key: "test-image-key".to_string(),
            image_base_url: base_url,
            image_width: 1280,
            image_height: 720,
            request_timeout: Duration::from_secs(10),
            links: MarketingLinks::default(),
        }
    }
}

fn required(name: &str) -> AiResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AiError::config_error(format!("{} not set", name)))
}
