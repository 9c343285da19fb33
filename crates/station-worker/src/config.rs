//! Worker configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Which loop the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Cycle orchestrator streaming a still image for hours.
    Live,
    /// Cycle orchestrator rendering and uploading short videos.
    Shorts,
    /// Always-on self-healing channel slots.
    Channels,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Live => "live",
            RunMode::Shorts => "shorts",
            RunMode::Channels => "channels",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" | "stream" => Ok(RunMode::Live),
            "shorts" | "short" => Ok(RunMode::Shorts),
            "channels" | "multi" => Ok(RunMode::Channels),
            other => Err(WorkerError::config_error(format!("unknown BOT_MODE: {other}"))),
        }
    }
}

/// What to do once every generation attempt has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Continue with the hard-coded concept and the bundled image.
    Fallback,
    /// Mark the cycle `ERROR`.
    Abort,
}

impl FailurePolicy {
    pub fn default_for(mode: RunMode) -> Self {
        match mode {
            RunMode::Shorts => FailurePolicy::Abort,
            RunMode::Live | RunMode::Channels => FailurePolicy::Fallback,
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(FailurePolicy::Fallback),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(WorkerError::config_error(format!(
                "unknown GENERATION_FAILURE_POLICY: {other}"
            ))),
        }
    }
}

/// Where cycle records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    Memory,
    Firestore,
}

impl FromStr for StateBackend {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StateBackend::Memory),
            "firestore" => Ok(StateBackend::Firestore),
            other => Err(WorkerError::config_error(format!("unknown STATE_BACKEND: {other}"))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub mode: RunMode,
    /// Stream length of one live cycle
    pub cycle_duration: Duration,
    /// Attempts per generation step
    pub generation_max_attempts: u32,
    /// Fixed delay between generation attempts
    pub generation_retry_delay: Duration,
    pub failure_policy: FailurePolicy,
    /// Sleep after a finished or failed cycle
    pub cycle_cooldown: Duration,
    /// Delay before the very first cycle
    pub cycle_start_delay: Duration,
    /// Interval of the "still streaming" log line
    pub stream_keepalive: Duration,
    /// Holds the temporary cover, rendered shorts and downloaded tracks
    pub work_dir: PathBuf,
    pub fallback_image_path: PathBuf,
    pub branding_logo_path: Option<PathBuf>,
    pub branding_font_path: Option<String>,
    /// Network audio for live cycles
    pub audio_source_url: Option<String>,
    /// ffconcat playlist for shorts and lofi channels
    pub lofi_playlist_url: Option<String>,
    pub short_duration: Duration,
    pub short_upload_enabled: bool,
    pub ffmpeg_path: String,
    pub ffmpeg_startup_grace: Duration,
    pub ffmpeg_preset: String,
    pub video_bitrate: String,
    pub channel_restart_backoff: Duration,
    pub channel_rotation: Duration,
    pub channel_maintenance_interval: Duration,
    /// Wait before asking the catalog again when it is short of assets
    pub channel_asset_retry: Duration,
    /// Lead time between creating a channel broadcast and its scheduled start
    pub channel_schedule_lead: Duration,
    pub api_central_url: Option<String>,
    pub state_backend: StateBackend,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Live,
            cycle_duration: Duration::from_secs(12 * 3600),
            generation_max_attempts: 3,
            generation_retry_delay: Duration::from_secs(2),
            failure_policy: FailurePolicy::Fallback,
            cycle_cooldown: Duration::from_secs(60),
            cycle_start_delay: Duration::from_secs(5),
            stream_keepalive: Duration::from_secs(60),
            work_dir: PathBuf::from("/tmp/station"),
            fallback_image_path: PathBuf::from("assets/default.jpg"),
            branding_logo_path: Some(PathBuf::from("assets/spotify_logo.png")),
            branding_font_path: None,
            audio_source_url: None,
            lofi_playlist_url: None,
            short_duration: Duration::from_secs(58),
            short_upload_enabled: true,
            ffmpeg_path: "ffmpeg".to_string(),
            ffmpeg_startup_grace: Duration::from_secs(3),
            ffmpeg_preset: "ultrafast".to_string(),
            video_bitrate: "3000k".to_string(),
            channel_restart_backoff: Duration::from_secs(10),
            channel_rotation: Duration::from_secs(24 * 3600),
            channel_maintenance_interval: Duration::from_secs(3600),
            channel_asset_retry: Duration::from_secs(5 * 60),
            channel_schedule_lead: Duration::from_secs(10 * 60),
            api_central_url: None,
            state_backend: StateBackend::Memory,
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(env_parse(name, default))
}

/// Whole hours, rejecting values whose length in seconds overflows.
fn env_hours(name: &str, default: u64) -> WorkerResult<Duration> {
    let hours = env_parse(name, default);
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| WorkerError::config_error(format!("{name}={hours} is out of range")))
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off"))
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Fails with a configuration error when a setting required by the
    /// selected mode is missing or an enumerated value is unknown.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let mode: RunMode = match env_nonempty("BOT_MODE") {
            Some(v) => v.parse()?,
            None => RunMode::Live,
        };
        let failure_policy = match env_nonempty("GENERATION_FAILURE_POLICY") {
            Some(v) => v.parse()?,
            None => FailurePolicy::default_for(mode),
        };
        let state_backend = match env_nonempty("STATE_BACKEND") {
            Some(v) => v.parse()?,
            None => StateBackend::Memory,
        };

        let api_central_url = env_nonempty("API_CENTRAL_URL").map(|u| u.trim_end_matches('/').to_string());
        let lofi_playlist_url = env_nonempty("LOFI_PLAYLIST_URL")
            .or_else(|| api_central_url.as_ref().map(|base| format!("{base}/youtube/playlist.txt")));

        let config = Self {
            mode,
            cycle_duration: env_hours("CYCLE_DURATION_HOURS", 12)?,
            generation_max_attempts: env_parse("GENERATION_MAX_ATTEMPTS", defaults.generation_max_attempts).max(1),
            generation_retry_delay: env_secs("GENERATION_RETRY_DELAY_SECS", 2),
            failure_policy,
            cycle_cooldown: env_secs("CYCLE_COOLDOWN_SECS", 60),
            cycle_start_delay: env_secs("CYCLE_START_DELAY_SECS", 5),
            stream_keepalive: env_secs("STREAM_KEEPALIVE_SECS", 60),
            work_dir: env_nonempty("WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
            fallback_image_path: env_nonempty("FALLBACK_IMAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.fallback_image_path),
            branding_logo_path: env_nonempty("BRANDING_LOGO_PATH")
                .map(PathBuf::from)
                .or(defaults.branding_logo_path),
            branding_font_path: env_nonempty("BRANDING_FONT_PATH"),
            audio_source_url: env_nonempty("AUDIO_SOURCE_URL"),
            lofi_playlist_url,
            short_duration: env_secs("SHORT_DURATION_SECS", 58),
            short_upload_enabled: env_bool("SHORT_UPLOAD_ENABLED", true),
            ffmpeg_path: env_nonempty("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffmpeg_startup_grace: env_secs("FFMPEG_STARTUP_GRACE_SECS", 3),
            ffmpeg_preset: env_nonempty("FFMPEG_PRESET").unwrap_or(defaults.ffmpeg_preset),
            video_bitrate: env_nonempty("VIDEO_BITRATE").unwrap_or(defaults.video_bitrate),
            channel_restart_backoff: env_secs("CHANNEL_RESTART_BACKOFF_SECS", 10),
            channel_rotation: env_hours("CHANNEL_ROTATION_HOURS", 24)?,
            channel_maintenance_interval: env_secs("CHANNEL_MAINTENANCE_INTERVAL_SECS", 3600),
            channel_asset_retry: env_secs("CHANNEL_ASSET_RETRY_SECS", 300),
            channel_schedule_lead: defaults.channel_schedule_lead,
            api_central_url,
            state_backend,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check mode-specific requirements.
    pub fn validate(&self) -> WorkerResult<()> {
        match self.mode {
            RunMode::Live if self.audio_source_url.is_none() => {
                Err(WorkerError::config_error("AUDIO_SOURCE_URL is required in live mode"))
            }
            RunMode::Shorts if self.lofi_playlist_url.is_none() => Err(WorkerError::config_error(
                "LOFI_PLAYLIST_URL or API_CENTRAL_URL is required in shorts mode",
            )),
            RunMode::Channels if self.api_central_url.is_none() => {
                Err(WorkerError::config_error("API_CENTRAL_URL is required in channels mode"))
            }
            _ => Ok(()),
        }
    }

    /// The single temporary cover file.
    pub fn cover_path(&self) -> PathBuf {
        self.work_dir.join("temp_cover.png")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "BOT_MODE",
        "GENERATION_FAILURE_POLICY",
        "AUDIO_SOURCE_URL",
        "API_CENTRAL_URL",
        "LOFI_PLAYLIST_URL",
        "CYCLE_DURATION_HOURS",
        "CHANNEL_ROTATION_HOURS",
        "STATE_BACKEND",
        "SHORT_UPLOAD_ENABLED",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_live_mode_requires_audio_source() {
        clear_env();
        let err = WorkerConfig::from_env().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("AUDIO_SOURCE_URL"));
    }

    #[test]
    #[serial]
    fn test_live_defaults() {
        clear_env();
        std::env::set_var("AUDIO_SOURCE_URL", "https://radio.example/stream");
        std::env::set_var("CYCLE_DURATION_HOURS", "2");

        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.mode, RunMode::Live);
        assert_eq!(config.failure_policy, FailurePolicy::Fallback);
        assert_eq!(config.cycle_duration, Duration::from_secs(7200));
        assert_eq!(config.generation_max_attempts, 3);
        assert_eq!(config.state_backend, StateBackend::Memory);
        assert_eq!(config.cover_path(), PathBuf::from("/tmp/station/temp_cover.png"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_shorts_mode_derives_playlist_and_aborts() {
        clear_env();
        std::env::set_var("BOT_MODE", "shorts");
        std::env::set_var("API_CENTRAL_URL", "https://central.example/");
        std::env::set_var("SHORT_UPLOAD_ENABLED", "false");

        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(
            config.lofi_playlist_url.as_deref(),
            Some("https://central.example/youtube/playlist.txt")
        );
        assert!(!config.short_upload_enabled);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unknown_enum_values_are_config_errors() {
        clear_env();
        std::env::set_var("BOT_MODE", "podcast");
        assert!(WorkerConfig::from_env().unwrap_err().is_fatal());

        std::env::set_var("BOT_MODE", "channels");
        std::env::set_var("API_CENTRAL_URL", "https://central.example");
        std::env::set_var("STATE_BACKEND", "redis");
        assert!(WorkerConfig::from_env().unwrap_err().is_fatal());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_overflowing_hours_are_config_errors() {
        clear_env();
        std::env::set_var("AUDIO_SOURCE_URL", "https://radio.example/stream");
        std::env::set_var("CYCLE_DURATION_HOURS", u64::MAX.to_string());
        let err = WorkerConfig::from_env().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("CYCLE_DURATION_HOURS"));

        std::env::remove_var("CYCLE_DURATION_HOURS");
        std::env::set_var("CHANNEL_ROTATION_HOURS", "5124095576030432");
        let err = WorkerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("CHANNEL_ROTATION_HOURS"));
        clear_env();
    }

    #[test]
    fn test_policy_override_parses() {
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert_eq!(" Fallback ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Fallback);
    }
}
