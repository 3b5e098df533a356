use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use image::RgbaImage;
use tracing::{debug, info};

use crate::{
    compose::Compositor,
    config::{VideoConfig, WatermarkConfig},
    error::{Result, VideoError},
    geometry,
    logo::Logo,
    video::{
        probe::probe,
        reader::FrameReader,
        types::{EncodedVideo, Frame, FrameRate, VideoMetadata},
        writer::{FrameSink, FrameWriter},
    },
};

/// Watermarks videos frame by frame through external FFmpeg processes
pub struct VideoCompositor {
    config: VideoConfig,
}

impl VideoCompositor {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Whether the default `ffmpeg` on PATH runs at all
    pub fn check_ffmpeg_available() -> bool {
        tool_runs("ffmpeg")
    }

    /// Whether both configured tools run
    pub fn tools_available(&self) -> bool {
        tool_runs(&self.config.ffmpeg) && tool_runs(&self.config.ffprobe)
    }

    /// Whether the configured ffmpeg was built with `encoder`
    pub fn encoder_available(&self, encoder: &str) -> bool {
        Command::new(&self.config.ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map(|output| {
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .any(|line| line.split_whitespace().nth(1) == Some(encoder))
            })
            .unwrap_or(false)
    }

    pub fn probe(&self, input: &Path) -> Result<VideoMetadata> {
        probe(&self.config.ffprobe, input)
    }

    /// Decode `input`, blend the logo into every frame and encode `output`.
    ///
    /// The logo is scaled and placed once from the stream size; every frame
    /// then gets the identical overlay. Frames are streamed one at a time
    /// from decoder to encoder in their original order.
    pub fn watermark_video(
        &self,
        input: &Path,
        output: &Path,
        logo: &Logo,
        config: &WatermarkConfig,
    ) -> Result<EncodedVideo> {
        let started = Instant::now();
        let metadata = self.probe(input)?;

        let prepared = logo.prepare(metadata.width, metadata.height, config.scale, config.opacity);
        let (x, y) = geometry::resolve(
            metadata.width,
            metadata.height,
            prepared.width(),
            prepared.height(),
            config.position,
            config.offset_x,
            config.offset_y,
        );
        debug!(
            "Logo {}x{} at ({}, {}) on {}x{} video",
            prepared.width(),
            prepared.height(),
            x,
            y,
            metadata.width,
            metadata.height
        );

        let mut reader = FrameReader::open(&self.config.ffmpeg, input, &metadata)?;
        let mut writer = FrameWriter::open(&self.config, output, &metadata)?;

        stamp_frames(reader.by_ref(), &mut writer, prepared.as_image(), x, y)?;

        reader.close()?;
        let frame_count = writer.finish()?;
        let file_size = std::fs::metadata(output)?.len();

        info!(
            "Video written: {} ({} frames, {} fps, {:.1}s)",
            output.display(),
            frame_count,
            metadata.fps,
            started.elapsed().as_secs_f64()
        );

        Ok(EncodedVideo {
            path: output.to_path_buf(),
            frame_count,
            fps: metadata.fps,
            width: metadata.width,
            height: metadata.height,
            file_size,
        })
    }

    /// Encode a solid-colour clip sweeping from green to blue over its length
    pub fn create_test_video(
        &self,
        output: &Path,
        width: u32,
        height: u32,
        fps: FrameRate,
        frames: u64,
    ) -> Result<EncodedVideo> {
        let metadata = VideoMetadata {
            width,
            height,
            fps,
            codec: "rawvideo".to_string(),
            frame_count: Some(frames),
        };

        let mut writer = FrameWriter::open(&self.config, output, &metadata)?;
        for i in 0..frames {
            let hue = 120.0 + (i as f32 / frames.max(1) as f32) * 120.0;
            writer.write_frame(&Frame::new_filled(width, height, hsv_to_rgb(hue, 0.7, 0.9)))?;
        }
        let frame_count = writer.finish()?;

        Ok(EncodedVideo {
            path: output.to_path_buf(),
            frame_count,
            fps,
            width,
            height,
            file_size: std::fs::metadata(output)?.len(),
        })
    }
}

impl Default for VideoCompositor {
    fn default() -> Self {
        Self::new(VideoConfig::default())
    }
}

impl Compositor for VideoCompositor {
    fn name(&self) -> &str {
        "video"
    }

    fn composite(
        &self,
        input: &Path,
        output: &Path,
        logo: &Logo,
        config: &WatermarkConfig,
    ) -> Result<PathBuf> {
        if !input.is_file() {
            return Err(VideoError::OpenFailed {
                path: input.display().to_string(),
                reason: "file not found".to_string(),
            }
            .into());
        }

        self.watermark_video(input, output, logo, config).map(|encoded| encoded.path)
    }
}

/// Blend the same logo at the same spot into every frame and pass the frames
/// on in order. Stops at the first decode or write error. Returns the number
/// of frames written.
pub fn stamp_frames<I, S>(frames: I, sink: &mut S, logo: &RgbaImage, x: i64, y: i64) -> Result<u64>
where
    I: IntoIterator<Item = Result<Frame>>,
    S: FrameSink + ?Sized,
{
    let mut written = 0;
    for frame in frames {
        let mut frame = frame?;
        frame.overlay(logo, x, y);
        sink.write_frame(&frame)?;
        written += 1;
    }
    Ok(written)
}

fn tool_runs(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}
