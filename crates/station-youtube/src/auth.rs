//! OAuth refresh-token exchange.
//!
//! No background refresh happens here. Callers invoke [`OAuthClient::refresh`]
//! before each phase that needs a credential and use the returned token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{YoutubeError, YoutubeResult};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Client id, secret and the pre-provisioned refresh token.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl OAuthCredentials {
    pub fn from_env() -> YoutubeResult<Self> {
        Ok(Self {
            client_id: required("YOUTUBE_CLIENT_ID")?,
            client_secret: required("YOUTUBE_CLIENT_SECRET")?,
            refresh_token: required("YOUTUBE_REFRESH_TOKEN")?,
        })
    }
}

fn required(name: &str) -> YoutubeResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| YoutubeError::config_error(format!("{} not set", name)))
}

/// A bearer token and the instant it stops being usable.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    token_url: String,
    credentials: OAuthCredentials,
    current: Arc<RwLock<Option<AccessToken>>>,
}

impl OAuthClient {
    pub fn new(http: Client, token_url: impl Into<String>, credentials: OAuthCredentials) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            credentials,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&self) -> YoutubeResult<AccessToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(YoutubeError::AuthFailed(format!("{}: {}", status, body)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| YoutubeError::AuthFailed(format!("malformed token response: {}", e)))?;

        let token = AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        };
        *self.current.write().await = Some(token.clone());

        info!(expires_in_secs = body.expires_in, "Refreshed YouTube access token");
        Ok(token)
    }

    /// The last refreshed token, refreshing only when it is missing or about to expire.
    pub async fn access_token(&self) -> YoutubeResult<String> {
        if let Some(token) = self.current.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }
        debug!("No fresh YouTube token cached, refreshing");
        Ok(self.refresh().await?.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh-1".into(),
        }
    }

    #[tokio::test]
    async fn test_refresh_posts_form_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient::new(Client::new(), format!("{}/token", server.uri()), credentials());
        let token = client.refresh().await.unwrap();
        assert_eq!(token.value, "ya29.token");
        assert!(token.is_fresh());

        // Served from the cache, no second exchange.
        assert_eq!(client.access_token().await.unwrap(), "ya29.token");
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let client = OAuthClient::new(Client::new(), server.uri(), credentials());
        let err = client.refresh().await.unwrap_err();
        assert!(matches!(err, YoutubeError::AuthFailed(msg) if msg.contains("invalid_grant")));
    }

    #[test]
    #[serial]
    fn test_credentials_require_refresh_token() {
        std::env::set_var("YOUTUBE_CLIENT_ID", "id");
        std::env::set_var("YOUTUBE_CLIENT_SECRET", "secret");
        std::env::remove_var("YOUTUBE_REFRESH_TOKEN");
        let err = OAuthCredentials::from_env().unwrap_err();
        assert!(matches!(err, YoutubeError::ConfigError(msg) if msg.contains("YOUTUBE_REFRESH_TOKEN")));
        std::env::remove_var("YOUTUBE_CLIENT_ID");
        std::env::remove_var("YOUTUBE_CLIENT_SECRET");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("refresh-1"));
    }
}
