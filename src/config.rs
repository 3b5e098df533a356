use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result, WatermarkError},
    geometry::Position,
};

/// Main configuration for the watermark compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logo placement and blending
    pub watermark: WatermarkConfig,

    /// Where and how results are written
    pub output: OutputConfig,

    /// Video decoding/encoding settings
    pub video: VideoConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound { path: path.display().to_string() }.into(),
            _ => WatermarkError::Io(e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.watermark.validate()?;
        self.output.validate()?;
        self.video.validate()?;
        Ok(())
    }
}

/// Placement and blending parameters for one batch.
///
/// This is a plain `Copy` value: a batch takes its own snapshot when it is
/// created, so editing the caller's copy never leaks into a running batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Largest fraction of the canvas the logo may cover, per axis (0.0-1.0]
    pub scale: f64,

    /// Global logo opacity (0.0-1.0)
    pub opacity: f64,

    /// Anchor on the canvas
    pub position: Position,

    /// Horizontal margin in pixels (ignored by centered positions)
    pub offset_x: u32,

    /// Vertical margin in pixels
    pub offset_y: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            scale: 0.2,
            opacity: 1.0,
            position: Position::CenterTop,
            offset_x: 20,
            offset_y: 20,
        }
    }
}

impl WatermarkConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "watermark.scale".to_string(),
                value: self.scale.to_string()
            }.into());
        }

        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ConfigError::InvalidValue {
                key: "watermark.opacity".to_string(),
                value: self.opacity.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving watermarked files (created if missing)
    pub directory: PathBuf,

    /// JPEG quality for flattened still images (1-100)
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            jpeg_quality: 95,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "output.jpeg_quality".to_string(),
                value: self.jpeg_quality.to_string()
            }.into());
        }

        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output.directory".to_string(),
                value: String::new()
            }.into());
        }

        Ok(())
    }
}

/// Video processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// FFmpeg executable used for decoding and encoding
    pub ffmpeg: String,

    /// FFprobe executable used to read stream parameters
    pub ffprobe: String,

    /// Encoder for every container except WebM
    pub codec: String,

    /// Output pixel format
    pub pixel_format: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            quality: 85,
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "video.quality".to_string(),
                value: self.quality.to_string()
            }.into());
        }

        if self.codec.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "video.codec".to_string(),
                value: self.codec.clone()
            }.into());
        }

        Ok(())
    }

    /// Map the 0-100 quality knob onto an x264/VP9 constant rate factor
    pub fn crf(&self) -> u8 {
        (51 - ((self.quality as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }

    /// Encoder to use for a given output container
    pub fn codec_for(&self, output: &Path) -> &str {
        match output.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("webm") => "libvpx-vp9",
            _ => &self.codec,
        }
    }
}
