//! Asset publishing errors.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Missing credentials or an unknown `STORAGE_BACKEND`.
    #[error("Storage backend misconfigured: {0}")]
    ConfigError(String),

    #[error("{backend} rejected upload of {key}: {detail}")]
    UploadFailed {
        backend: &'static str,
        key: String,
        detail: String,
    },

    #[error("{backend} could not delete {key}: {detail}")]
    DeleteFailed {
        backend: &'static str,
        key: String,
        detail: String,
    },

    #[error("Asset name '{0}' is not a valid object key")]
    InvalidKey(String),

    #[error("Cannot read asset: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(backend: &'static str, key: &str, detail: impl Into<String>) -> Self {
        Self::UploadFailed {
            backend,
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    pub fn delete_failed(backend: &'static str, key: &str, detail: impl Into<String>) -> Self {
        Self::DeleteFailed {
            backend,
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_errors_name_backend_and_key() {
        let err = StorageError::delete_failed("r2", "covers/cover_1.png", "HTTP 403");
        assert_eq!(err.to_string(), "r2 could not delete covers/cover_1.png: HTTP 403");
        assert!(!err.is_config());
    }
}
