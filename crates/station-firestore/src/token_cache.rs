//! Bearer tokens for cycle record writes.
//!
//! The recorder persists one record at a time, so a plain mutex around the
//! cached token is enough: whoever holds it refreshes it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FirestoreError, FirestoreResult};

/// Tokens closer than this to expiry are replaced before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

enum Credentials {
    ServiceAccount(Arc<dyn TokenProvider>),
    /// The emulator accepts any bearer value.
    Static(String),
}

pub struct TokenCache {
    credentials: Credentials,
    current: Mutex<Option<(String, Instant)>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            credentials: Credentials::ServiceAccount(provider),
            current: Mutex::new(None),
        }
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::Static(token.into()),
            current: Mutex::new(None),
        }
    }

    /// Forget the cached token after the server rejected it as expired.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    pub async fn get_token(&self) -> FirestoreResult<String> {
        let provider = match &self.credentials {
            Credentials::Static(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(provider) => provider,
        };

        let mut current = self.current.lock().await;
        if let Some((token, expires_at)) = current.as_ref() {
            if Instant::now() + REFRESH_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }

        let token = provider
            .token(&[DATASTORE_SCOPE])
            .await
            .map_err(|e| FirestoreError::auth_error(format!("Failed to obtain auth token: {}", e)))?;
        let ttl = (token.expires_at() - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let access_token = token.as_str().to_string();

        debug!(ttl_secs = ttl.as_secs(), "Refreshed Firestore access token");
        *current = Some((access_token.clone(), Instant::now() + ttl));
        Ok(access_token)
    }
}
