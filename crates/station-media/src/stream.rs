//! Declarative encoder requests.
//!
//! A [`StreamSpec`] says what to encode (visual input, audio input,
//! destination, duration, output profile); [`StreamSpec::build_args`] is the
//! pure mapping to an FFmpeg argument vector, so presets are testable
//! without spawning anything.

use std::path::PathBuf;
use std::time::Duration;

use station_models::MediaSource;

use crate::command::FfmpegCommand;
use crate::countdown::{Countdown, CountdownStyle};
use crate::filters::DrawText;

/// Flags that let FFmpeg survive short drops of an HTTP audio source.
pub const RECONNECT_FLAGS: [&str; 6] = [
    "-reconnect",
    "1",
    "-reconnect_streamed",
    "1",
    "-reconnect_delay_max",
    "5",
];

/// Protocols allowed when a concat playlist references remote files.
pub const CONCAT_PROTOCOLS: &str = "file,http,https,tcp,tls";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualInput {
    /// One picture looped for the whole output.
    StillImage(MediaSource),
    /// A clip looped forever in real time.
    LoopedVideo(MediaSource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    /// A continuous audio stream (radio, ambient track).
    Stream(MediaSource),
    /// An ffconcat playlist.
    Playlist(MediaSource),
    /// A local audio file.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// RTMP ingest URL; muxed as FLV.
    Rtmp(String),
    File(PathBuf),
}

impl Destination {
    fn target(&self) -> String {
        match self {
            Destination::Rtmp(url) => url.clone(),
            Destination::File(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Output profile: resolution, frame rate and codec settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamProfile {
    /// 1280x720 at 1 fps, for a still image over radio audio.
    StillImage720p,
    /// 1920x1080 at 24 fps with constant bitrate, for looped video channels.
    Channel1080p { preset: String, bitrate: String },
    /// 720x1280 at 30 fps file render.
    VerticalShort,
}

/// Everything the encoder needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub visual: VisualInput,
    pub audio: AudioInput,
    pub destination: Destination,
    /// Hard `-t` bound. `None` runs until the inputs end or the process is stopped.
    pub duration: Option<Duration>,
    pub profile: StreamProfile,
    pub countdown: Option<Countdown>,
    pub font_file: Option<String>,
}

impl StreamSpec {
    /// Still image + network audio to an RTMP ingest with a countdown overlay.
    pub fn live_still(
        image: MediaSource,
        audio: MediaSource,
        rtmp_url: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            visual: VisualInput::StillImage(image),
            audio: AudioInput::Stream(audio),
            destination: Destination::Rtmp(rtmp_url.into()),
            duration: Some(duration),
            profile: StreamProfile::StillImage720p,
            countdown: Some(Countdown::new(duration)),
            font_file: None,
        }
    }

    /// Looped video channel without a duration bound.
    pub fn channel(
        video: MediaSource,
        audio: AudioInput,
        rtmp_url: impl Into<String>,
        preset: impl Into<String>,
        bitrate: impl Into<String>,
    ) -> Self {
        Self {
            visual: VisualInput::LoopedVideo(video),
            audio,
            destination: Destination::Rtmp(rtmp_url.into()),
            duration: None,
            profile: StreamProfile::Channel1080p {
                preset: preset.into(),
                bitrate: bitrate.into(),
            },
            countdown: None,
            font_file: None,
        }
    }

    /// Vertical short rendered to a local MP4.
    pub fn short(
        image: impl Into<PathBuf>,
        audio: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        duration: Duration,
    ) -> Self {
        Self {
            visual: VisualInput::StillImage(MediaSource::Path(image.into())),
            audio: AudioInput::File(audio.into()),
            destination: Destination::File(output.into()),
            duration: Some(duration),
            profile: StreamProfile::VerticalShort,
            countdown: Some(Countdown::new(duration).with_style(CountdownStyle::Minutes)),
            font_file: None,
        }
    }

    pub fn with_font(mut self, font_file: Option<String>) -> Self {
        self.font_file = font_file;
        self
    }

    /// Map the request to an FFmpeg argument vector.
    pub fn build_args(&self) -> Vec<String> {
        let cmd = FfmpegCommand::new(self.destination.target());
        let cmd = self.add_visual(cmd);
        let cmd = self.add_audio(cmd);
        let cmd = cmd.map("0:v:0").map("1:a:0").video_filter(self.video_filter());
        let mut cmd = self.add_encoding(cmd);

        if let Some(duration) = self.duration {
            cmd = cmd.duration_secs(duration.as_secs());
        }

        match &self.destination {
            Destination::Rtmp(_) => cmd.format("flv").build_args(),
            Destination::File(_) => cmd.output_arg("-shortest").overwrite().build_args(),
        }
    }

    fn add_visual(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        match (&self.visual, &self.profile) {
            (VisualInput::StillImage(src), StreamProfile::StillImage720p) => cmd.input(
                ["-thread_queue_size", "128", "-loop", "1", "-framerate", "1"],
                src.as_input(),
            ),
            (VisualInput::StillImage(src), _) => cmd.input(["-loop", "1"], src.as_input()),
            (VisualInput::LoopedVideo(src), _) => {
                cmd.input(["-re", "-stream_loop", "-1"], src.as_input())
            }
        }
    }

    fn add_audio(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        match &self.audio {
            AudioInput::Stream(src) if src.is_network() => {
                cmd.input(RECONNECT_FLAGS, src.as_input())
            }
            AudioInput::Stream(src) => cmd.input(Vec::<String>::new(), src.as_input()),
            AudioInput::Playlist(src) => cmd.input(
                ["-f", "concat", "-safe", "0", "-protocol_whitelist", CONCAT_PROTOCOLS],
                src.as_input(),
            ),
            AudioInput::File(path) => {
                cmd.input(Vec::<String>::new(), path.to_string_lossy().into_owned())
            }
        }
    }

    /// The `-vf` chain for this profile.
    pub fn video_filter(&self) -> String {
        let mut chain: Vec<String> = Vec::new();
        match &self.profile {
            StreamProfile::StillImage720p => {
                chain.push("scale=1280:720,setsar=1".to_string());
                if let Some(countdown) = &self.countdown {
                    chain.push(
                        DrawText::new(format!("FIN\\: {}", countdown.drawtext_expr()))
                            .font_file(self.font_file.as_deref())
                            .font_size(30)
                            .position("w-tw-20", "20")
                            .boxed("black@0.5", 5)
                            .build(),
                    );
                }
                chain.push("fps=1".to_string());
            }
            StreamProfile::Channel1080p { .. } => {
                chain.push(
                    "scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:-1:-1,setsar=1"
                        .to_string(),
                );
            }
            StreamProfile::VerticalShort => {
                chain.push("scale=720:1280,setsar=1".to_string());
                if let Some(countdown) = &self.countdown {
                    chain.push(
                        DrawText::new(countdown.drawtext_expr())
                            .font_file(self.font_file.as_deref())
                            .font_size(50)
                            .position("(w-tw)/2", "150")
                            .boxed("black@0.5", 10)
                            .build(),
                    );
                }
                chain.push("fps=30".to_string());
            }
        }
        chain.join(",")
    }

    fn add_encoding(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        match &self.profile {
            StreamProfile::StillImage720p => cmd.video_codec("libx264").output_args([
                "-preset", "ultrafast", "-tune", "stillimage", "-r", "1", "-g", "2", "-pix_fmt",
                "yuv420p", "-c:a", "aac", "-b:a", "96k", "-ar", "44100",
            ]),
            StreamProfile::Channel1080p { preset, bitrate } => cmd
                .video_codec("libx264")
                .preset(preset.clone())
                .output_args(["-x264-params", "keyint=48:min-keyint=48"])
                .output_args(["-b:v", bitrate.as_str(), "-maxrate", bitrate.as_str()])
                .output_args(["-bufsize".to_string(), double_bitrate(bitrate)])
                .output_args([
                    "-r", "24", "-g", "48", "-threads", "1", "-flush_packets", "1", "-c:a", "aac",
                    "-b:a", "128k", "-ar", "44100",
                ]),
            StreamProfile::VerticalShort => cmd.video_codec("libx264").output_args([
                "-preset", "ultrafast", "-crf", "23", "-pix_fmt", "yuv420p", "-c:a", "aac", "-b:a",
                "128k", "-ac", "2", "-ar", "44100",
            ]),
        }
    }
}

/// `3000k` -> `6000k`. Unparseable values fall back to 6000k.
fn double_bitrate(bitrate: &str) -> String {
    let digits: String = bitrate.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: u64 = digits.parse().unwrap_or(3000);
    format!("{}k", value * 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(spec: &StreamSpec) -> String {
        spec.build_args().join(" ")
    }

    #[test]
    fn test_live_still_arguments() {
        let spec = StreamSpec::live_still(
            MediaSource::url("https://cdn.example.com/covers/a.png"),
            MediaSource::url("https://radio.example.com/stream"),
            "rtmp://a.rtmp.youtube.com/live2/key",
            Duration::from_secs(12 * 3600),
        );
        let args = spec.build_args();

        assert_eq!(&args[..3], &["-hide_banner", "-loglevel", "error"]);
        assert_eq!(args.last().map(String::as_str), Some("rtmp://a.rtmp.youtube.com/live2/key"));

        let line = joined(&spec);
        assert!(line.contains(
            "-thread_queue_size 128 -loop 1 -framerate 1 -i https://cdn.example.com/covers/a.png"
        ));
        assert!(line.contains(
            "-reconnect 1 -reconnect_streamed 1 -reconnect_delay_max 5 -i https://radio.example.com/stream"
        ));
        assert!(line.contains("-map 0:v:0 -map 1:a:0"));
        assert!(line.contains("-tune stillimage -r 1 -g 2 -pix_fmt yuv420p"));
        assert!(line.contains("-t 43200 -f flv"));

        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[vf_pos + 1],
            r"scale=1280:720,setsar=1,drawtext=text='FIN\: %{eif\:(43200-t)/3600\:d\:2}\:%{eif\:(mod(43200-t,3600))/60\:d\:2}\:%{eif\:mod(43200-t,60)\:d\:2}':fontcolor=white:fontsize=30:x=w-tw-20:y=20:box=1:boxcolor=black@0.5:boxborderw=5,fps=1"
        );
    }

    #[test]
    fn test_local_audio_has_no_reconnect_flags() {
        let spec = StreamSpec::live_still(
            MediaSource::path("/tmp/a.png"),
            MediaSource::path("/tmp/a.mp3"),
            "rtmp://x/live2/k",
            Duration::from_secs(60),
        );
        assert!(!spec.build_args().contains(&"-reconnect".to_string()));
    }

    #[test]
    fn test_channel_with_playlist() {
        let spec = StreamSpec::channel(
            MediaSource::url("https://cdn.example.com/loop.mp4"),
            AudioInput::Playlist(MediaSource::url("https://api.example.com/youtube/playlist.txt")),
            "rtmp://x/live2/k",
            "ultrafast",
            "3000k",
        );
        let line = joined(&spec);
        assert!(line.contains("-re -stream_loop -1 -i https://cdn.example.com/loop.mp4"));
        assert!(line.contains(
            "-f concat -safe 0 -protocol_whitelist file,http,https,tcp,tls -i https://api.example.com/youtube/playlist.txt"
        ));
        assert!(line.contains("-b:v 3000k -maxrate 3000k -bufsize 6000k"));
        assert!(line.contains("-r 24 -g 48 -threads 1 -flush_packets 1"));
        assert!(!line.contains(" -t "));
        assert!(line.ends_with("-f flv rtmp://x/live2/k"));
    }

    #[test]
    fn test_short_render() {
        let spec = StreamSpec::short("/w/cover.png", "/w/track.mp3", "/w/short.mp4", Duration::from_secs(58));
        let args = spec.build_args();
        let line = args.join(" ");
        assert!(line.contains("-loop 1 -i /w/cover.png -i /w/track.mp3"));
        assert!(line.contains("scale=720:1280,setsar=1,drawtext=text='%{eif\\:(58-t)/60\\:d\\:1}"));
        assert!(line.contains("x=(w-tw)/2:y=150:box=1:boxcolor=black@0.5:boxborderw=10,fps=30"));
        assert!(line.contains("-crf 23 -pix_fmt yuv420p -c:a aac -b:a 128k -ac 2 -ar 44100"));
        assert!(line.ends_with("-t 58 -shortest -y /w/short.mp4"));
    }

    #[test]
    fn test_double_bitrate() {
        assert_eq!(double_bitrate("4500k"), "9000k");
        assert_eq!(double_bitrate("fast"), "6000k");
    }
}
