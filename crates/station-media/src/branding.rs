//! Branding composite for generated artwork.
//!
//! The raw image is normalised to 1280x720 PNG with the `image` crate, then
//! FFmpeg draws the brand bar, the brand text and the optional logo in one
//! pass.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageFormat;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::command::{run_to_completion, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::filters::{escape_drawtext, DrawText};

// =============================================================================
// Configuration
// =============================================================================

/// Fixed overlay layout.
#[derive(Debug, Clone)]
pub struct BrandingConfig {
    pub width: u32,
    pub height: u32,
    pub bar_y: u32,
    pub bar_height: u32,
    pub bar_color: String,
    pub text: String,
    pub font_size: u32,
    pub font_file: Option<String>,
    pub logo_path: Option<PathBuf>,
    pub logo_size: u32,
    pub logo_x: u32,
    pub logo_y: u32,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            bar_y: 660,
            bar_height: 60,
            bar_color: "black@0.5".to_string(),
            text: "DESDE RELAX STATION".to_string(),
            font_size: 30,
            font_file: None,
            logo_path: None,
            logo_size: 50,
            logo_x: 450,
            logo_y: 665,
        }
    }
}

impl BrandingConfig {
    pub fn with_logo(mut self, path: Option<PathBuf>) -> Self {
        self.logo_path = path;
        self
    }

    pub fn with_font(mut self, font: Option<String>) -> Self {
        self.font_file = font;
        self
    }

    /// Logo path if the file exists. A missing logo is logged, not an error.
    fn available_logo(&self) -> Option<&Path> {
        let path = self.logo_path.as_deref()?;
        if path.exists() {
            Some(path)
        } else {
            warn!(path = %path.display(), "Logo not found, branding without logo");
            None
        }
    }

    /// `-filter_complex` graph; input 0 is the artwork, input 1 the logo.
    pub fn filter_graph(&self, with_logo: bool) -> String {
        let bar = format!(
            "drawbox=x=0:y={}:w={}:h={}:color={}:t=fill",
            self.bar_y, self.width, self.bar_height, self.bar_color
        );
        let text = DrawText::new(escape_drawtext(&self.text))
            .font_file(self.font_file.as_deref())
            .font_size(self.font_size)
            .position("(w-tw)/2", format!("{}+({}-th)/2", self.bar_y, self.bar_height))
            .build();

        if with_logo {
            format!(
                "[0:v]{bar},{text}[base];[1:v]scale={s}:{s}:force_original_aspect_ratio=decrease[logo];[base][logo]overlay={x}:{y}",
                s = self.logo_size,
                x = self.logo_x,
                y = self.logo_y,
            )
        } else {
            format!("[0:v]{bar},{text}")
        }
    }

    pub fn build_args(&self, input: &Path, output: &Path, with_logo: bool) -> Vec<String> {
        let mut cmd = FfmpegCommand::new(output.to_string_lossy())
            .input(Vec::<String>::new(), input.to_string_lossy());
        if let Some(logo) = self.logo_path.as_deref().filter(|_| with_logo) {
            cmd = cmd.input(Vec::<String>::new(), logo.to_string_lossy());
        }
        cmd.filter_complex(self.filter_graph(with_logo))
            .output_args(["-frames:v", "1"])
            .overwrite()
            .build_args()
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Decode `bytes` and write them to `dest` as a PNG of exactly `width`x`height`.
pub fn normalize_image(bytes: &[u8], dest: &Path, width: u32, height: u32) -> MediaResult<()> {
    let decoded = image::load_from_memory(bytes)?;
    let resized = if decoded.width() == width && decoded.height() == height {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Lanczos3)
    };
    resized.save_with_format(dest, ImageFormat::Png)?;
    Ok(())
}

/// Composite branding onto raw artwork, writing the result to `output`.
///
/// An intermediate `<output>.raw.png` is always removed before returning.
pub async fn apply_branding(
    program: &str,
    config: &BrandingConfig,
    raw: Vec<u8>,
    output: &Path,
    cancel: &CancellationToken,
) -> MediaResult<()> {
    let raw_path = output.with_extension("raw.png");

    let (width, height) = (config.width, config.height);
    let normalize_target = raw_path.clone();
    tokio::task::spawn_blocking(move || normalize_image(&raw, &normalize_target, width, height))
        .await
        .map_err(|e| MediaError::internal(format!("normalize task failed: {e}")))??;

    let with_logo = config.available_logo().is_some();
    let args = config.build_args(&raw_path, output, with_logo);
    let result = run_to_completion(program, &args, cancel).await;

    if let Err(e) = tokio::fs::remove_file(&raw_path).await {
        warn!(path = %raw_path.display(), error = %e, "Failed to remove raw artwork");
    }

    result?;
    info!(output = %output.display(), with_logo, "Artwork branded");
    Ok(())
}
