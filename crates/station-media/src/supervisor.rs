//! Process Supervisor.
//!
//! Owns at most one encoder subprocess per logical slot. Starting a process
//! for an occupied slot kills the previous one and waits for it to exit
//! before spawning. Each process gets two background tasks:
//!
//! - a stderr scanner that logs lines containing failure keywords;
//! - a monitor that waits for exit, delivers interrupt/kill requests and
//!   publishes the final [`ProcessExit`] on a watch channel.
//!
//! The encoder enforces its own duration through `-t`; the supervisor never
//! kills on a timer.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::stream::StreamSpec;

/// Stderr substrings that indicate trouble.
pub const FAILURE_KEYWORDS: [&str; 3] = ["Error", "fail", "Invalid"];

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Encoder binary.
    pub program: String,
    /// A process that survives this long is considered started.
    pub startup_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            startup_grace: Duration::from_secs(3),
        }
    }
}

impl SupervisorConfig {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Terminating signal on unix.
    pub signal: Option<i32>,
    /// True when the exit followed a stop or kill request.
    pub stop_requested: bool,
}

impl ProcessExit {
    /// Exit status of a monitor that disappeared without reporting.
    const LOST: ProcessExit = ProcessExit {
        code: None,
        signal: None,
        stop_requested: false,
    };

    fn from_status(status: &ExitStatus, stop_requested: bool) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            stop_requested,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn outcome(&self) -> &'static str {
        if self.success() {
            "success"
        } else if self.stop_requested {
            "stopped"
        } else {
            "failure"
        }
    }
}

/// Runtime handle to one supervised process.
///
/// Cloning is cheap; every clone observes the same process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    slot: String,
    generation: u64,
    pid: Option<u32>,
    started_at: Instant,
    duration: Option<Duration>,
    restart_count: u32,
    interrupt: CancellationToken,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl ProcessHandle {
    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Intended duration (the `-t` bound), if any.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Exit status, once the process has ended.
    pub fn exit(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.exit().is_some()
    }

    /// True once [`ProcessSupervisor::stop`] was called for this process.
    pub fn stop_requested(&self) -> bool {
        self.interrupt.is_cancelled()
    }

    /// Wait until the process exits.
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        let observed = rx.wait_for(Option::is_some).await.map(|exit| *exit);
        match observed {
            Ok(Some(exit)) => exit,
            _ => (*rx.borrow()).unwrap_or(ProcessExit::LOST),
        }
    }
}

struct SlotEntry {
    handle: ProcessHandle,
    kill: CancellationToken,
}

/// Supervises encoder subprocesses keyed by slot name.
#[derive(Clone)]
pub struct ProcessSupervisor {
    config: Arc<SupervisorConfig>,
    slots: Arc<Mutex<HashMap<String, SlotEntry>>>,
    generation: Arc<AtomicU64>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config: Arc::new(config),
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Start the encoder described by `spec` in `slot`.
    pub async fn start_stream(
        &self,
        slot: &str,
        spec: &StreamSpec,
        restart_count: u32,
    ) -> MediaResult<ProcessHandle> {
        self.start_process(slot, spec.build_args(), spec.duration, restart_count)
            .await
    }

    /// Start a process in `slot`, replacing whatever runs there.
    ///
    /// Returns once the process has stayed alive for the startup grace
    /// window, or has already exited with code 0 inside it.
    pub async fn start_process(
        &self,
        slot: &str,
        args: Vec<String>,
        duration: Option<Duration>,
        restart_count: u32,
    ) -> MediaResult<ProcessHandle> {
        let handle = {
            let mut slots = self.slots.lock().await;

            if let Some(previous) = slots.remove(slot) {
                info!(slot, pid = ?previous.handle.pid, "Killing previous encoder for slot");
                previous.kill.cancel();
                previous.handle.wait().await;
            }

            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            let (handle, kill) = self.spawn(slot, generation, &args, duration, restart_count)?;
            slots.insert(
                slot.to_string(),
                SlotEntry {
                    handle: handle.clone(),
                    kill,
                },
            );
            handle
        };

        let grace = self.config.startup_grace;
        match tokio::time::timeout(grace, handle.wait()).await {
            Err(_) => {
                info!(slot, pid = ?handle.pid, "Encoder running");
                Ok(handle)
            }
            Ok(exit) if exit.success() || exit.stop_requested => Ok(handle),
            Ok(exit) => {
                warn!(slot, code = ?exit.code, signal = ?exit.signal, "Encoder died during startup");
                Err(MediaError::startup(
                    slot,
                    format!("exited within {}ms of launch", grace.as_millis()),
                    exit.code,
                ))
            }
        }
    }

    fn spawn(
        &self,
        slot: &str,
        generation: u64,
        args: &[String],
        duration: Option<Duration>,
        restart_count: u32,
    ) -> MediaResult<(ProcessHandle, CancellationToken)> {
        debug!(slot, "Spawning {} {}", self.config.program, args.join(" "));

        let mut child = Command::new(&self.config.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::startup(slot, format!("spawn {}: {e}", self.config.program), None))?;

        metrics::record_encoder_start(slot);

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(scan_stderr(slot.to_string(), stderr));
        }

        let interrupt = CancellationToken::new();
        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = watch::channel(None);

        let handle = ProcessHandle {
            slot: slot.to_string(),
            generation,
            pid: child.id(),
            started_at: Instant::now(),
            duration,
            restart_count,
            interrupt: interrupt.clone(),
            exit_rx,
        };

        tokio::spawn(monitor(
            child,
            slot.to_string(),
            generation,
            interrupt,
            kill.clone(),
            exit_tx,
            Arc::clone(&self.slots),
        ));

        Ok((handle, kill))
    }

    /// Wait for the process behind `handle` to exit.
    pub async fn wait(&self, handle: &ProcessHandle) -> ProcessExit {
        handle.wait().await
    }

    /// Ask the process to stop with an interrupt. Idempotent; does not wait.
    pub fn stop(&self, handle: &ProcessHandle) {
        if !handle.interrupt.is_cancelled() {
            debug!(slot = %handle.slot, "Stop requested");
        }
        handle.interrupt.cancel();
    }

    /// Interrupt whatever runs in `slot`. Returns false when the slot is empty.
    pub async fn stop_slot(&self, slot: &str) -> bool {
        let slots = self.slots.lock().await;
        match slots.get(slot) {
            Some(entry) if !entry.handle.is_finished() => {
                self.stop(&entry.handle);
                true
            }
            _ => false,
        }
    }

    /// Interrupt every active process. Returns how many were signalled.
    pub async fn stop_all(&self) -> usize {
        let slots = self.slots.lock().await;
        let mut stopped = 0;
        for entry in slots.values().filter(|e| !e.handle.is_finished()) {
            self.stop(&entry.handle);
            stopped += 1;
        }
        stopped
    }

    /// Kill every active process and wait for them to exit.
    pub async fn kill_all(&self) {
        let entries: Vec<SlotEntry> = {
            let mut slots = self.slots.lock().await;
            slots.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &entries {
            entry.kill.cancel();
        }
        for entry in entries {
            entry.handle.wait().await;
        }
    }

    /// Handle of the process currently occupying `slot`.
    pub async fn handle(&self, slot: &str) -> Option<ProcessHandle> {
        let slots = self.slots.lock().await;
        slots.get(slot).map(|e| e.handle.clone())
    }

    pub async fn is_active(&self, slot: &str) -> bool {
        self.handle(slot)
            .await
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Names of slots with a running process.
    pub async fn active_slots(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, e)| !e.handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Log stderr lines that contain a failure keyword; discard the rest.
async fn scan_stderr(slot: String, stderr: ChildStderr) {
    let alerts = scan_lines(&slot, stderr).await;
    debug!(slot = %slot, alerts, "Encoder stderr closed");
}

/// Drain `reader` line by line until EOF. Bytes that are not UTF-8 are
/// replaced, never treated as the end of output: dropping the pipe early
/// would kill the encoder with SIGPIPE on its next write.
///
/// Returns how many lines matched a failure keyword.
async fn scan_lines<R: AsyncRead + Unpin>(slot: &str, reader: R) -> usize {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut alerts = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(slot = %slot, error = %e, "Encoder stderr read failed");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        if FAILURE_KEYWORDS.iter().any(|k| line.contains(k)) {
            warn!(slot = %slot, "[ffmpeg] {}", line.trim());
            metrics::record_stderr_alert(slot);
            alerts += 1;
        } else {
            trace!(slot = %slot, "[ffmpeg] {}", line);
        }
    }
    alerts
}

async fn monitor(
    mut child: Child,
    slot: String,
    generation: u64,
    interrupt: CancellationToken,
    kill: CancellationToken,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    slots: Arc<Mutex<HashMap<String, SlotEntry>>>,
) {
    let mut interrupted = false;
    let mut killed = false;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = interrupt.cancelled(), if !interrupted => {
                interrupted = true;
                if !send_interrupt(&child) {
                    let _ = child.start_kill();
                }
            }
            _ = kill.cancelled(), if !killed => {
                killed = true;
                let _ = child.start_kill();
            }
        }
    };

    let exit = match status {
        Ok(status) => ProcessExit::from_status(&status, interrupted || killed),
        Err(e) => {
            warn!(slot = %slot, error = %e, "Failed to wait on encoder");
            ProcessExit {
                stop_requested: interrupted || killed,
                ..ProcessExit::LOST
            }
        }
    };

    info!(
        slot = %slot,
        code = ?exit.code,
        signal = ?exit.signal,
        stop_requested = exit.stop_requested,
        "Encoder exited"
    );
    metrics::record_encoder_exit(&slot, exit.outcome());

    // Publish before touching the slot map: a concurrent start holds the
    // map lock while waiting for this exit.
    let _ = exit_tx.send(Some(exit));

    let mut slots = slots.lock().await;
    if slots
        .get(&slot)
        .map(|e| e.handle.generation == generation)
        .unwrap_or(false)
    {
        slots.remove(&slot);
    }
}

#[cfg(unix)]
fn send_interrupt(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGINT).is_ok(),
        None => false,
    }
}

#[cfg(not(unix))]
fn send_interrupt(_child: &Child) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(
            SupervisorConfig::default()
                .with_program("sh")
                .with_startup_grace(Duration::from_millis(200)),
        )
    }

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    #[tokio::test]
    async fn test_second_start_kills_first() {
        let sup = supervisor();
        let first = sup
            .start_process("main", script("exec sleep 30"), None, 0)
            .await
            .unwrap();
        assert!(sup.is_active("main").await);

        let second = sup
            .start_process("main", script("exec sleep 30"), None, 1)
            .await
            .unwrap();

        let first_exit = first.exit().expect("first process must be gone");
        assert!(first_exit.stop_requested);
        assert!(!second.is_finished());
        assert_eq!(second.restart_count(), 1);
        assert_eq!(sup.active_slots().await, vec!["main".to_string()]);

        sup.kill_all().await;
        assert!(second.is_finished());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let sup = supervisor();
        let handle = sup
            .start_process("main", script("exec sleep 30"), None, 0)
            .await
            .unwrap();

        sup.stop(&handle);
        sup.stop(&handle);
        let exit = tokio::time::timeout(Duration::from_secs(5), sup.wait(&handle))
            .await
            .unwrap();
        assert!(exit.stop_requested);
        assert!(!exit.success());

        sup.stop(&handle);
        assert!(!sup.stop_slot("main").await);
        assert!(!sup.is_active("main").await);
    }

    #[tokio::test]
    async fn test_early_failure_is_startup_error() {
        let sup = supervisor();
        let err = sup
            .start_process("main", script("echo 'Invalid argument' >&2; exit 1"), None, 0)
            .await
            .unwrap_err();
        match err {
            MediaError::SubprocessStartup { slot, exit_code, .. } => {
                assert_eq!(slot, "main");
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_quick_clean_exit_is_completion() {
        let sup = supervisor();
        let handle = sup
            .start_process("main", script("exit 0"), Some(Duration::from_secs(3600)), 0)
            .await
            .unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .unwrap();
        assert_eq!(exit.code, Some(0));
        assert!(!exit.stop_requested);
    }

    #[tokio::test]
    async fn test_stderr_keywords_do_not_terminate() {
        let sup = supervisor();
        let handle = sup
            .start_process(
                "main",
                script("echo 'Error while decoding' >&2; sleep 0.4; exit 0"),
                None,
                0,
            )
            .await
            .unwrap();
        let exit = handle.wait().await;
        assert!(exit.success());
        assert!(handle.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_missing_program_is_startup_error() {
        let sup = ProcessSupervisor::new(
            SupervisorConfig::default().with_program("/nonexistent/encoder"),
        );
        let err = sup
            .start_process("main", Vec::new(), None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::SubprocessStartup { .. }));
        assert!(!sup.is_active("main").await);
    }

    #[tokio::test]
    async fn test_slots_are_independent() {
        let sup = supervisor();
        let a = sup
            .start_process("a", script("exec sleep 30"), None, 0)
            .await
            .unwrap();
        let b = sup
            .start_process("b", script("exec sleep 30"), None, 0)
            .await
            .unwrap();

        assert!(sup.stop_slot("a").await);
        a.wait().await;
        assert!(!b.is_finished());
        assert_eq!(sup.active_slots().await, vec!["b".to_string()]);

        assert_eq!(sup.stop_all().await, 1);
        b.wait().await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_stderr_is_drained() {
        let sup = ProcessSupervisor::new(
            SupervisorConfig::default()
                .with_program("sh")
                .with_startup_grace(Duration::ZERO),
        );
        let body = "printf '\\377\\n' >&2; i=0; while [ $i -lt 4000 ]; do echo line$i >&2; i=$((i+1)); done; exit 0";
        let handle = sup
            .start_process("main", script(body), None, 0)
            .await
            .unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();
        assert_eq!(exit.code, Some(0));
        assert_eq!(exit.signal, None);
        assert!(exit.success());
    }

    #[tokio::test]
    async fn test_scan_lines_survives_invalid_bytes() {
        let mut input: Vec<u8> = b"frame=1 fps=2\n\xff\xfe title\n".to_vec();
        input.extend_from_slice(b"Invalid data found when processing input\n");
        assert_eq!(scan_lines("main", input.as_slice()).await, 1);
    }

    #[tokio::test]
    async fn test_keyword_after_heavy_output_is_detected() {
        let mut input = Vec::new();
        for i in 0..20_000 {
            input.extend_from_slice(format!("frame={i} fps=2 q=28.0 size=1024kB\n").as_bytes());
        }
        input.extend_from_slice(b"Connection to tcp://ingest failed\n");
        input.extend_from_slice(b"Error writing trailer");
        assert_eq!(scan_lines("main", input.as_slice()).await, 2);
    }
}
