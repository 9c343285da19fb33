//! Fixed-delay retries and cancellable sleeps.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{WorkerError, WorkerResult};

/// Bounded attempts with a constant pause in between.
#[derive(Debug, Clone)]
pub struct FixedRetry {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
    /// Operation name for logging.
    pub operation: String,
}

impl FixedRetry {
    pub fn new(operation: impl Into<String>, max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            operation: operation.into(),
        }
    }
}

/// Sleep for `duration`. Returns `true` when `cancel` fired first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancel.cancelled() => true,
    }
}

/// Await `fut` unless `cancel` fires first.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = WorkerResult<T>>,
) -> WorkerResult<T> {
    tokio::select! {
        result = fut => result,
        _ = cancel.cancelled() => Err(WorkerError::Cancelled),
    }
}

/// Run `op` until it succeeds or the attempts run out.
///
/// `op` receives the 1-based attempt number. Each attempt and each pause
/// observes `cancel`; cancellation returns [`WorkerError::Cancelled`]
/// immediately. After the last failed attempt its error is returned.
pub async fn retry_fixed<F, Fut, T>(
    policy: &FixedRetry,
    cancel: &CancellationToken,
    mut op: F,
) -> WorkerResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = WorkerResult<T>>,
{
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            result = op(attempt) => result,
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancelled() || e.is_fatal() => return Err(e),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    operation = %policy.operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Attempt failed, retrying in {}s",
                    policy.delay.as_secs()
                );
                if sleep_or_cancel(policy.delay, cancel).await {
                    return Err(WorkerError::Cancelled);
                }
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    operation = %policy.operation,
                    attempts = attempt,
                    error = %e,
                    "All attempts failed"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> FixedRetry {
        FixedRetry::new("test", attempts, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_fixed(&policy(3), &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(WorkerError::generation("flaky"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: WorkerResult<()> = retry_fixed(&policy(3), &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(WorkerError::generation(format!("attempt {attempt}"))) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Generation failed: attempt 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_configuration_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: WorkerResult<()> = retry_fixed(&policy(3), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(WorkerError::config_error("missing key")) }
        })
        .await;

        assert!(result.unwrap_err().is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_pause() {
        let cancel = CancellationToken::new();
        let slow = FixedRetry::new("slow", 3, Duration::from_secs(3600));
        let trigger = cancel.clone();

        let result: WorkerResult<()> = retry_fixed(&slow, &cancel, |_| {
            trigger.cancel();
            async { Err(WorkerError::generation("boom")) }
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellable_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: WorkerResult<()> = cancellable(&cancel, std::future::pending()).await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_sleep_or_cancel() {
        let cancel = CancellationToken::new();
        assert!(!sleep_or_cancel(Duration::from_millis(1), &cancel).await);
        cancel.cancel();
        assert!(sleep_or_cancel(Duration::from_secs(3600), &cancel).await);
    }
}
