//! # Watermark Compositor
//!
//! Stamp a translucent logo onto batches of images and videos.
//!
//! The logo is scaled to a fraction of each target, anchored at one of six
//! positions with pixel margins, alpha-blended with a global opacity and the
//! result written to an output folder without overwriting anything.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use watermark_compositor::{BatchEvent, BatchPipeline, Config, Logo};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let logo = Arc::new(Logo::load("logo.png")?);
//!
//! let pipeline = BatchPipeline::from_config(&config, logo)?;
//! let mut batch = pipeline.spawn(vec!["holiday/".into(), "clip.mp4".into()]);
//!
//! while let Some(event) = batch.next_event().await {
//!     println!("{}", event);
//! }
//! let report = batch.wait().await?;
//! println!("{} written", report.succeeded.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`geometry`] - Anchor positions and top-left placement
//! - [`logo`] - Logo loading, resizing and opacity
//! - [`compose`] - Alpha blending and the [`Compositor`] trait
//! - [`video`] - Frame-by-frame video watermarking through FFmpeg
//! - [`media`] - Expanding input paths into supported files
//! - [`output`] - Output folder and collision-free names
//! - [`batch`] - Sequential background batches with progress events
//! - [`config`] - Configuration management
//!
//! ## Custom Compositors
//!
//! The batch pipeline dispatches through [`Compositor`], so other media
//! handlers can be plugged in:
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use watermark_compositor::{Compositor, Logo, Result, WatermarkConfig};
//!
//! struct Passthrough;
//!
//! impl Compositor for Passthrough {
//!     fn name(&self) -> &str {
//!         "passthrough"
//!     }
//!
//!     fn composite(&self, input: &Path, output: &Path, _: &Logo, _: &WatermarkConfig) -> Result<PathBuf> {
//!         std::fs::copy(input, output)?;
//!         Ok(output.to_path_buf())
//!     }
//! }
//! ```

pub mod batch;
pub mod compose;
pub mod config;
pub mod error;
pub mod geometry;
pub mod logo;
pub mod media;
pub mod output;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    batch::{BatchEvent, BatchHandle, BatchPipeline, BatchReport, CancelToken, EventSink},
    compose::{Compositor, ImageCompositor},
    config::{Config, WatermarkConfig},
    error::{Result, WatermarkError},
    geometry::Position,
    logo::Logo,
    media::{MediaFile, MediaKind},
    output::OutputPathAllocator,
    video::VideoCompositor,
};
