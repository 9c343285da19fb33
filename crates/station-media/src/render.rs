//! One-shot renders to local files.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::command::run_to_completion;
use crate::error::{MediaError, MediaResult};
use crate::stream::{Destination, StreamSpec};

/// Render `spec` to its file destination and return the output path.
///
/// A partial output is removed when the render fails or is cancelled.
pub async fn render_to_file(
    program: &str,
    spec: &StreamSpec,
    cancel: &CancellationToken,
) -> MediaResult<PathBuf> {
    let output = match &spec.destination {
        Destination::File(path) => path.clone(),
        Destination::Rtmp(_) => {
            return Err(MediaError::internal("render_to_file needs a file destination"))
        }
    };

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(
        output = %output.display(),
        duration_secs = spec.duration.map(|d| d.as_secs()),
        "Rendering video"
    );

    if let Err(e) = run_to_completion(program, &spec.build_args(), cancel).await {
        let _ = tokio::fs::remove_file(&output).await;
        return Err(e);
    }

    if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
        return Err(MediaError::ffmpeg_failed(
            "render finished without producing output",
            None,
            Some(0),
        ));
    }
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_render_reports_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let spec = StreamSpec::short(
            dir.path().join("cover.png"),
            dir.path().join("track.mp3"),
            dir.path().join("out/short.mp4"),
            Duration::from_secs(58),
        );
        let err = render_to_file("true", &spec, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FfmpegFailed { .. }));
        assert!(dir.path().join("out").is_dir());
    }

    #[tokio::test]
    async fn test_render_returns_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("short.mp4");
        // Fake encoder: touch the last argument.
        let script = dir.path().join("enc.sh");
        std::fs::write(&script, "#!/bin/sh\nfor last; do :; done\ntouch \"$last\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let spec = StreamSpec::short("/c.png", "/t.mp3", &output, Duration::from_secs(5));
        let path = render_to_file(&script.to_string_lossy(), &spec, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, output);
        assert!(output.exists());
    }
}
