//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while encoding, streaming or rendering.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    /// The encoder failed to launch or died inside the startup grace window.
    #[error("Encoder for slot {slot} failed to start: {message}")]
    SubprocessStartup {
        slot: String,
        message: String,
        exit_code: Option<i32>,
    },

    /// The encoder exited non-zero after it was running.
    #[error("Encoder for slot {slot} exited abnormally (code {exit_code:?})")]
    SubprocessRuntime { slot: String, exit_code: Option<i32> },

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn startup(slot: impl Into<String>, message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::SubprocessStartup {
            slot: slot.into(),
            message: message.into(),
            exit_code,
        }
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        Self::download_failed(e.to_string())
    }
}
