//! FFmpeg command builder and one-shot runner.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Number of trailing stderr bytes kept for error reports.
const STDERR_TAIL: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Input {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output_args: Vec<String>,
    output: String,
    overwrite: bool,
}

impl FfmpegCommand {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.into(),
            overwrite: false,
        }
    }

    /// Add an input with its per-input options (placed before its `-i`).
    pub fn input<I, S>(mut self, args: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            args: args.into_iter().map(Into::into).collect(),
            source: source.into(),
        });
        self
    }

    /// Add one output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Hard output duration bound.
    pub fn duration_secs(self, seconds: u64) -> Self {
        self.output_arg("-t").output_arg(seconds.to_string())
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Write `-y` before the output.
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Build the argument vector (without the program name).
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push(self.output.clone());
        args
    }
}

/// Resolve the encoder binary.
pub fn check_ffmpeg(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::FfmpegNotFound)
}

/// Run a command to completion, killing it if `cancel` fires.
///
/// Used for short one-shot jobs (branding composite, short render) where
/// slot supervision is not needed.
pub async fn run_to_completion(
    program: &str,
    args: &[String],
    cancel: &CancellationToken,
) -> MediaResult<()> {
    debug!("Running {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
            _ => MediaError::ffmpeg_failed(format!("Failed to spawn {program}: {e}"), None, None),
        })?;

    let mut stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(stderr) = stderr.as_mut() {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = cancel.cancelled() => {
            info!("{} cancelled, killing process", program);
            let _ = child.kill().await;
            stderr_task.abort();
            return Err(MediaError::Cancelled);
        }
    };

    let stderr = stderr_task.await.unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        let text = String::from_utf8_lossy(&stderr);
        let start = text.len().saturating_sub(STDERR_TAIL);
        let tail = text
            .get(start..)
            .unwrap_or(&text)
            .trim()
            .to_string();
        Err(MediaError::ffmpeg_failed(
            format!("{program} exited with non-zero status"),
            Some(tail),
            status.code(),
        ))
    }
}
