//! Supervision policies layered on [`ProcessSupervisor`].
//!
//! - [`run_bounded`]: run one encoder for its `-t` duration and report how it
//!   ended. Used by the cycle orchestrator.
//! - [`SelfHealingChannel`]: keep a slot streaming forever, restarting after
//!   a fixed backoff whenever the encoder exits. Used by channel mode.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::countdown::render_hms;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::stream::StreamSpec;
use crate::supervisor::{ProcessExit, ProcessHandle, ProcessSupervisor};

/// Run `spec` in `slot` until the encoder exits.
///
/// `started`, when given, fires once the encoder has survived its startup
/// grace window; it is dropped unsent if startup fails.
///
/// A clean exit, including one before the requested duration, is a normal
/// completion. An exit that follows a stop request is also returned as
/// `Ok`. Any other non-zero exit is [`MediaError::SubprocessRuntime`].
/// Cancelling `cancel` interrupts the encoder, waits for it and returns
/// [`MediaError::Cancelled`].
pub async fn run_bounded(
    supervisor: &ProcessSupervisor,
    slot: &str,
    spec: &StreamSpec,
    cancel: &CancellationToken,
    keepalive: Duration,
    started: Option<oneshot::Sender<()>>,
) -> MediaResult<ProcessExit> {
    let handle = tokio::select! {
        handle = supervisor.start_stream(slot, spec, 0) => handle?,
        _ = cancel.cancelled() => {
            supervisor.stop_slot(slot).await;
            return Err(MediaError::Cancelled);
        }
    };
    if let Some(started) = started {
        let _ = started.send(());
    }

    let exit = watch_until_exit(supervisor, &handle, cancel, keepalive).await;

    if cancel.is_cancelled() {
        return Err(MediaError::Cancelled);
    }
    if exit.success() || exit.stop_requested {
        Ok(exit)
    } else {
        Err(MediaError::SubprocessRuntime {
            slot: slot.to_string(),
            exit_code: exit.code,
        })
    }
}

async fn watch_until_exit(
    supervisor: &ProcessSupervisor,
    handle: &ProcessHandle,
    cancel: &CancellationToken,
    keepalive: Duration,
) -> ProcessExit {
    let mut ticker = tokio::time::interval(keepalive.max(Duration::from_millis(10)));
    ticker.tick().await;

    loop {
        tokio::select! {
            exit = handle.wait() => return exit,
            _ = cancel.cancelled() => {
                supervisor.stop(handle);
                return handle.wait().await;
            }
            _ = ticker.tick() => {
                let remaining = handle
                    .duration()
                    .map(|d| render_hms(d.saturating_sub(handle.elapsed()).as_secs()))
                    .unwrap_or_else(|| "unbounded".to_string());
                info!(slot = %handle.slot(), remaining = %remaining, "Streaming");
            }
        }
    }
}

/// A slot that restarts its encoder indefinitely.
///
/// The `StreamSpec` is read from a watch channel on every (re)start, so a new
/// asset or ingest target is picked up by updating the channel and
/// stopping the slot. A restart triggered by a spec change skips the
/// backoff.
pub struct SelfHealingChannel {
    supervisor: ProcessSupervisor,
    slot: String,
    spec: watch::Receiver<StreamSpec>,
    backoff: Duration,
    restarts: Arc<AtomicU32>,
}

impl SelfHealingChannel {
    pub fn new(
        supervisor: ProcessSupervisor,
        slot: impl Into<String>,
        spec: watch::Receiver<StreamSpec>,
        backoff: Duration,
    ) -> Self {
        Self {
            supervisor,
            slot: slot.into(),
            spec,
            backoff,
            restarts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared restart counter.
    pub fn restarts(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.restarts)
    }

    /// Run until `cancel` fires. Returns the number of restarts.
    pub async fn run(mut self, cancel: CancellationToken) -> u32 {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let spec = self.spec.borrow_and_update().clone();
            let restart_count = self.restarts.load(Ordering::Relaxed);

            match self
                .supervisor
                .start_stream(&self.slot, &spec, restart_count)
                .await
            {
                Ok(handle) => {
                    info!(slot = %self.slot, restarts = restart_count, "Channel encoder started");
                    tokio::select! {
                        exit = handle.wait() => {
                            if exit.stop_requested {
                                info!(slot = %self.slot, "Channel encoder stopped on request");
                            } else {
                                warn!(
                                    slot = %self.slot,
                                    code = ?exit.code,
                                    "Channel encoder closed, restarting in {}s",
                                    self.backoff.as_secs()
                                );
                            }
                        }
                        _ = cancel.cancelled() => {
                            self.supervisor.stop(&handle);
                            handle.wait().await;
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(slot = %self.slot, error = %e, "Channel encoder failed to start");
                }
            }

            if !self.spec.has_changed().unwrap_or(false) {
                tokio::select! {
                    _ = tokio::time::sleep(self.backoff) => {}
                    _ = cancel.cancelled() => break,
                }
            }

            self.restarts.fetch_add(1, Ordering::Relaxed);
            metrics::record_restart(&self.slot);
        }

        info!(slot = %self.slot, "Channel supervision ended");
        self.restarts.load(Ordering::Relaxed)
    }
}
