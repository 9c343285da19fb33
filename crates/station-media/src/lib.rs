//! Encoder supervision and media rendering.
//!
//! This crate provides:
//! - Typed encoder requests ([`StreamSpec`]) mapped to FFmpeg arguments
//! - The countdown overlay
//! - The Process Supervisor: one subprocess per slot, start/wait/stop
//! - Two supervision policies: bounded cycle and self-healing channel
//! - One-shot renders (branding composite, short video)
//! - ffconcat playlist parsing and a track cache

pub mod branding;
pub mod command;
pub mod countdown;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod playlist;
pub mod policy;
pub mod render;
pub mod stream;
pub mod supervisor;

pub use branding::{apply_branding, normalize_image, BrandingConfig};
pub use command::{check_ffmpeg, run_to_completion, FfmpegCommand};
pub use countdown::{render_hms, Countdown, CountdownStyle};
pub use error::{MediaError, MediaResult};
pub use playlist::{parse_ffconcat, pick_random, track_file_name, TrackCache};
pub use policy::{run_bounded, SelfHealingChannel};
pub use render::render_to_file;
pub use stream::{AudioInput, Destination, StreamProfile, StreamSpec, VisualInput};
pub use supervisor::{ProcessExit, ProcessHandle, ProcessSupervisor, SupervisorConfig};
