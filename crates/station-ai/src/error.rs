//! Asset provider error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response contained no image")]
    MissingImage,

    #[error("Generated concept rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

impl From<station_models::ModelError> for AiError {
    fn from(e: station_models::ModelError) -> Self {
        Self::Rejected(e.to_string())
    }
}
