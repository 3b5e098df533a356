//! # Logo Handling
//!
//! Loads the watermark asset once and derives per-canvas copies that are
//! resized to the configured fraction of the target and carry the global
//! opacity in their alpha channel.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::{debug, info};

use crate::error::{AssetError, Result};

/// Decoded watermark asset, always RGBA8
#[derive(Clone, Debug)]
pub struct Logo {
    image: RgbaImage,
    source: Option<PathBuf>,
}

/// Logo resized and alpha-scaled for one specific canvas
#[derive(Clone, Debug)]
pub struct PreparedLogo {
    image: RgbaImage,
}

impl Logo {
    /// Load a logo from disk, promoting opaque formats to RGBA
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AssetError::NotFound { path: path.display().to_string() }.into());
        }

        let image = image::open(path).map_err(|e| AssetError::DecodeFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let logo = Self {
            image: image.to_rgba8(),
            source: Some(path.to_path_buf()),
        };

        info!("Logo loaded: {} ({}x{})", path.display(), logo.width(), logo.height());
        Ok(logo)
    }

    /// Wrap an already decoded image
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: image.to_rgba8(),
            source: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Path the logo was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Resize factor for a canvas; capped at 1.0 so the logo is never enlarged
    pub fn scale_factor(&self, canvas_w: u32, canvas_h: u32, scale: f64) -> f64 {
        let fit_w = canvas_w as f64 * scale / self.width().max(1) as f64;
        let fit_h = canvas_h as f64 * scale / self.height().max(1) as f64;
        fit_w.min(fit_h).min(1.0)
    }

    /// Produce the copy to blend onto a `canvas_w` x `canvas_h` target
    pub fn prepare(&self, canvas_w: u32, canvas_h: u32, scale: f64, opacity: f64) -> PreparedLogo {
        let factor = self.scale_factor(canvas_w, canvas_h, scale);
        // Nudge before flooring so 383.99999999999997 still counts as 384
        let new_w = ((self.width() as f64 * factor + 1e-9).floor() as u32).max(1);
        let new_h = ((self.height() as f64 * factor + 1e-9).floor() as u32).max(1);

        let mut image = if (new_w, new_h) == self.image.dimensions() {
            self.image.clone()
        } else {
            resize_premultiplied(&self.image, new_w, new_h)
        };

        let opacity = opacity.clamp(0.0, 1.0);
        if opacity < 1.0 {
            for pixel in image.pixels_mut() {
                pixel[3] = (pixel[3] as f64 * opacity).clamp(0.0, 255.0) as u8;
            }
        }

        debug!(
            "Prepared logo {}x{} -> {}x{} for {}x{} canvas (factor {:.3}, opacity {:.2})",
            self.width(), self.height(), new_w, new_h, canvas_w, canvas_h, factor, opacity
        );

        PreparedLogo { image }
    }
}

/// Lanczos3 resize in premultiplied space so transparent pixels do not
/// bleed their hidden colour into the edges
fn resize_premultiplied(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut premultiplied = DynamicImage::ImageRgba8(image.clone()).into_rgba32f();
    for pixel in premultiplied.pixels_mut() {
        let alpha = pixel[3];
        for c in 0..3 {
            pixel[c] *= alpha;
        }
    }

    let resized = image::imageops::resize(&premultiplied, width, height, FilterType::Lanczos3);

    RgbaImage::from_fn(width, height, |x, y| {
        let pixel = resized.get_pixel(x, y);
        let alpha = pixel[3].clamp(0.0, 1.0);
        let mut out = [0u8; 4];
        if alpha > 0.0 {
            for c in 0..3 {
                out[c] = to_u8(pixel[c] / alpha);
            }
        }
        out[3] = to_u8(alpha);
        Rgba(out)
    })
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl PreparedLogo {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }
}
