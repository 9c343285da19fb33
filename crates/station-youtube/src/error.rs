//! YouTube client error types.

use thiserror::Error;

pub type YoutubeResult<T> = Result<T, YoutubeError>;

#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Token refresh failed: {0}")]
    AuthFailed(String),

    #[error("{operation} failed with {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl YoutubeError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_response(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            message: message.into(),
        }
    }

    /// Read a non-success response into an `Api` error.
    pub async fn from_response(operation: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Api {
            operation,
            status,
            body,
        }
    }
}
