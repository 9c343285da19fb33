//! Worker error types.
//!
//! Every lower crate error is folded into one of the cycle failure classes
//! so the orchestrator can log and record a single taxonomy name.

use station_ai::AiError;
use station_firestore::FirestoreError;
use station_media::MediaError;
use station_models::ModelError;
use station_storage::StorageError;
use station_youtube::YoutubeError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Upstream text or image service failure.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    /// Broadcast platform failure.
    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Encoder failed to start: {0}")]
    SubprocessStartup(String),

    #[error("Encoder exited abnormally: {0}")]
    SubprocessRuntime(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// Asset catalog unreachable or short of assets.
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Invalid cycle state: {0}")]
    InvalidState(#[from] ModelError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Taxonomy name used in logs, metrics and recorded errors.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Generation(_) => "GenerationError",
            WorkerError::Publish(_) => "PublishError",
            WorkerError::Registration(_) => "RegistrationError",
            WorkerError::SubprocessStartup(_) => "SubprocessStartupError",
            WorkerError::SubprocessRuntime(_) => "SubprocessRuntimeError",
            WorkerError::Configuration(_) => "ConfigurationError",
            WorkerError::Persistence(_) => "PersistenceError",
            WorkerError::Catalog(_) => "CatalogError",
            WorkerError::Media(_) => "MediaError",
            WorkerError::InvalidState(_) => "StateError",
            WorkerError::Cancelled => "Cancelled",
            WorkerError::Io(_) => "IoError",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }

    /// Only configuration problems stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::Configuration(_))
    }

    /// `"<kind>: <message>"`, as stored on a failed cycle record.
    pub fn describe(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<AiError> for WorkerError {
    fn from(e: AiError) -> Self {
        match e {
            AiError::ConfigError(msg) => WorkerError::Configuration(msg),
            other => WorkerError::Generation(other.to_string()),
        }
    }
}

impl From<StorageError> for WorkerError {
    fn from(e: StorageError) -> Self {
        if e.is_config() {
            WorkerError::Configuration(e.to_string())
        } else {
            WorkerError::Publish(e.to_string())
        }
    }
}

impl From<YoutubeError> for WorkerError {
    fn from(e: YoutubeError) -> Self {
        match e {
            YoutubeError::ConfigError(msg) => WorkerError::Configuration(msg),
            other => WorkerError::Registration(other.to_string()),
        }
    }
}

impl From<FirestoreError> for WorkerError {
    fn from(e: FirestoreError) -> Self {
        match e {
            FirestoreError::ConfigError(msg) => WorkerError::Configuration(msg),
            other => WorkerError::Persistence(other.to_string()),
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::SubprocessStartup { .. } => WorkerError::SubprocessStartup(e.to_string()),
            MediaError::SubprocessRuntime { .. } => WorkerError::SubprocessRuntime(e.to_string()),
            MediaError::FfmpegNotFound => WorkerError::Configuration(e.to_string()),
            MediaError::Cancelled => WorkerError::Cancelled,
            MediaError::Io(io) => WorkerError::Io(io),
            other => WorkerError::Media(other.to_string()),
        }
    }
}
