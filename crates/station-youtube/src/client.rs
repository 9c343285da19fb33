//! Shared HTTP plumbing for the YouTube Data API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::auth::{OAuthClient, OAuthCredentials, DEFAULT_TOKEN_URL};
use crate::error::{YoutubeError, YoutubeResult};

#[derive(Debug, Clone)]
pub struct YoutubeConfig {
    pub credentials: OAuthCredentials,
    /// API root, `https://www.googleapis.com` in production.
    pub api_base_url: String,
    pub token_url: String,
    /// `public`, `unlisted` or `private`.
    pub privacy_status: String,
    pub timeout: Duration,
}

impl YoutubeConfig {
    pub fn from_env() -> YoutubeResult<Self> {
        Ok(Self {
            credentials: OAuthCredentials::from_env()?,
            api_base_url: std::env::var("YOUTUBE_API_BASE_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
            token_url: std::env::var("YOUTUBE_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            privacy_status: std::env::var("YOUTUBE_PRIVACY_STATUS").unwrap_or_else(|_| "public".to_string()),
            timeout: Duration::from_secs(
                std::env::var("YOUTUBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        })
    }
}

#[derive(Clone)]
pub struct YoutubeClient {
    pub(crate) http: Client,
    pub(crate) api_base_url: String,
    pub(crate) privacy_status: String,
    auth: OAuthClient,
}

impl YoutubeClient {
    pub fn new(config: YoutubeConfig) -> YoutubeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("station-youtube/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            auth: OAuthClient::new(http.clone(), config.token_url, config.credentials),
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            privacy_status: config.privacy_status,
        })
    }

    pub fn from_env() -> YoutubeResult<Self> {
        Self::new(YoutubeConfig::from_env()?)
    }

    pub fn auth(&self) -> &OAuthClient {
        &self.auth
    }

    /// Exchange the refresh token now.
    pub async fn refresh_credentials(&self) -> YoutubeResult<()> {
        self.auth.refresh().await.map(|_| ())
    }

    pub(crate) fn api_url(&self, resource: &str) -> String {
        format!("{}/youtube/v3/{}", self.api_base_url, resource)
    }

    pub(crate) async fn authorized(&self, request: RequestBuilder) -> YoutubeResult<RequestBuilder> {
        let token = self.auth.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    /// Send and decode a JSON response, mapping non-2xx into `Api` errors.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> YoutubeResult<T> {
        let response = self.send(operation, request).await?;
        response
            .json()
            .await
            .map_err(|e| YoutubeError::invalid_response(operation, e.to_string()))
    }

    pub(crate) async fn send(&self, operation: &'static str, request: RequestBuilder) -> YoutubeResult<Response> {
        let response = self.authorized(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(YoutubeError::from_response(operation, response).await);
        }
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A client pointed at `server` with a token endpoint already mocked.
    pub async fn client_for(server: &MockServer) -> YoutubeClient {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "expires_in": 3600
            })))
            .mount(server)
            .await;

        YoutubeClient::new(YoutubeConfig {
            credentials: OAuthCredentials {
                client_id: "cid".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
            },
            api_base_url: server.uri(),
            token_url: format!("{}/token", server.uri()),
            privacy_status: "public".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }
}
