use std::ffi::OsString;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use tracing::{debug, info, warn};

use crate::{
    compose::{blend, Compositor},
    config::WatermarkConfig,
    error::{ImageError, Result},
    geometry,
    logo::Logo,
};

/// How a watermarked still is written back out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillEncoding {
    /// Lossless, alpha preserved
    Png,
    /// Flattened to RGB at the configured quality
    Jpeg,
}

impl StillEncoding {
    /// PNG sources stay PNG; everything else is flattened to JPEG
    pub fn for_source(path: &Path) -> Self {
        match ImageFormat::from_path(path) {
            Ok(ImageFormat::Png) => Self::Png,
            _ => Self::Jpeg,
        }
    }
}

/// Watermarks single raster images
pub struct ImageCompositor {
    jpeg_quality: u8,
}

impl ImageCompositor {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn decode(input: &Path) -> Result<DynamicImage> {
        let decode_failed = |reason: String| ImageError::DecodeFailed {
            path: input.display().to_string(),
            reason,
        };

        let image = ImageReader::open(input)
            .map_err(|e| decode_failed(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| decode_failed(e.to_string()))?
            .decode()
            .map_err(|e| decode_failed(e.to_string()))?;

        Ok(image)
    }

    /// Encode fully in memory, then write; a failed write leaves no file behind
    fn encode(&self, image: DynamicImage, encoding: StillEncoding, output: &Path) -> Result<()> {
        let encode_failed = |reason: String| ImageError::EncodeFailed {
            path: output.display().to_string(),
            reason,
        };

        let mut bytes = Vec::new();
        match encoding {
            StillEncoding::Png => image
                .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
                .map_err(|e| encode_failed(e.to_string()))?,
            StillEncoding::Jpeg => {
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality)
                    .encode_image(&rgb)
                    .map_err(|e| encode_failed(e.to_string()))?;
            }
        }

        if let Err(e) = std::fs::write(output, &bytes) {
            if output.exists() {
                if let Err(remove) = std::fs::remove_file(output) {
                    warn!("Failed to remove incomplete output {}: {}", output.display(), remove);
                }
            }
            return Err(encode_failed(e.to_string()).into());
        }

        Ok(())
    }
}

impl Default for ImageCompositor {
    fn default() -> Self {
        Self::new(95)
    }
}

impl Compositor for ImageCompositor {
    fn name(&self) -> &str {
        "image"
    }

    fn output_file_name(&self, input: &Path) -> OsString {
        let name = input
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("image"));

        let keeps_extension = matches!(
            input.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
            Some("png" | "jpg" | "jpeg")
        );

        if keeps_extension {
            name
        } else {
            Path::new(&name).with_extension("jpg").into_os_string()
        }
    }

    fn composite(
        &self,
        input: &Path,
        output: &Path,
        logo: &Logo,
        config: &WatermarkConfig,
    ) -> Result<PathBuf> {
        let mut base = Self::decode(input)?.to_rgba8();
        let (width, height) = base.dimensions();

        let prepared = logo.prepare(width, height, config.scale, config.opacity);
        let (x, y) = geometry::resolve(
            width,
            height,
            prepared.width(),
            prepared.height(),
            config.position,
            config.offset_x,
            config.offset_y,
        );

        match blend::overlay(&mut base, prepared.as_image(), x, y) {
            Some(region) => debug!("Blended logo at ({}, {}) covering {:?}", x, y, region),
            None => debug!("Logo at ({}, {}) lies outside {}x{} image, nothing blended", x, y, width, height),
        }

        let encoding = StillEncoding::for_source(input);
        self.encode(DynamicImage::ImageRgba8(base), encoding, output)?;

        info!("Image written: {} ({:?})", output.display(), encoding);
        Ok(output.to_path_buf())
    }
}
