//! Broadcast registrar backed by the YouTube Data API v3.
//!
//! Credentials are a long-lived refresh token exchanged for access tokens
//! through an explicit [`OAuthClient::refresh`] call.

pub mod auth;
pub mod client;
pub mod error;
pub mod live;
pub mod upload;

pub use auth::{AccessToken, OAuthClient, OAuthCredentials};
pub use client::{YoutubeClient, YoutubeConfig};
pub use error::{YoutubeError, YoutubeResult};
pub use live::{truncate_chars, LiveEventRequest};
pub use upload::ShortUpload;
