//! Backoff for cycle record writes and history reads.

use std::time::Duration;

use tracing::warn;

use crate::error::FirestoreResult;
use crate::metrics::record_retry;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Defaults, with `FIRESTORE_MAX_RETRIES` overriding the attempt count.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: std::env::var("FIRESTORE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            ..defaults
        }
    }

    /// Full-jitter exponential delay, or the server's Retry-After when given.
    fn delay(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(after) = retry_after_ms {
            return Duration::from_millis(after);
        }
        let ceiling = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        let floor = self.base_delay_ms.min(ceiling);
        Duration::from_millis(rand::random_range(floor..=ceiling))
    }
}

/// Run `op`, retrying network errors, 429 and 5xx responses.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = FirestoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay(attempt, e.retry_after_ms());
                attempt += 1;
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Firestore request failed, retrying: {}",
                    e
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}
