use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage, RgbImage};

use crate::compose::{blend, Region};

/// Represents a single video frame
///
/// Frames arrive from the decoder as packed RGB. They are held as RGBA with
/// a synthesized opaque alpha channel so the same blend routine used for
/// still images applies unchanged, and the alpha is dropped again on output.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbaImage,
}

impl Frame {
    /// Create a new frame from an RGBA image buffer
    pub fn new(buffer: RgbaImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba([color[0], color[1], color[2], 255]));
        Self { buffer }
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let pixel = self.buffer.get_pixel(x, y);
        [pixel[0], pixel[1], pixel[2]]
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Blend a prepared logo onto this frame, clipped to the frame bounds
    pub fn overlay(&mut self, logo: &RgbaImage, x: i64, y: i64) -> Option<Region> {
        blend::overlay(&mut self.buffer, logo, x, y)
    }

    /// Convert the frame to raw RGB bytes, dropping alpha
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.buffer.width() as usize * self.buffer.height() as usize * 3);
        for pixel in self.buffer.pixels() {
            bytes.extend_from_slice(&pixel.0[..3]);
        }
        bytes
    }

    /// Create a frame from raw RGB bytes, adding an opaque alpha channel
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let rgb: RgbImage = ImageBuffer::from_raw(width, height, data)?;
        Some(Self {
            buffer: DynamicImage::ImageRgb8(rgb).into_rgba8(),
        })
    }
}

/// Exact stream frame rate as reported by the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Option<Self> {
        (num > 0 && den > 0).then_some(Self { num, den })
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for FrameRate {
    type Err = String;

    /// Parses `30000/1001` style rationals as well as plain integers
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num, den),
            None => (s, "1"),
        };

        let num: u32 = num.trim().parse().map_err(|_| format!("invalid frame rate '{}'", s))?;
        let den: u32 = den.trim().parse().map_err(|_| format!("invalid frame rate '{}'", s))?;
        Self::new(num, den).ok_or_else(|| format!("invalid frame rate '{}'", s))
    }
}

/// Video stream parameters needed to decode and re-encode
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: FrameRate,
    pub codec: String,
    /// Frame count from the container header, when it declares one
    pub frame_count: Option<u64>,
}

impl VideoMetadata {
    /// Size in bytes of one packed RGB frame
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Summary of a finished re-encode
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: std::path::PathBuf,
    pub frame_count: u64,
    pub fps: FrameRate,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}
