//! # Compositing
//!
//! Alpha blending of a prepared logo and the [`Compositor`] seam the batch
//! pipeline dispatches through.
//!
//! ## Built-in Compositors
//!
//! - **Still**: decodes one raster image, blends, writes PNG or JPEG
//! - **Video**: streams frames through FFmpeg (see [`crate::video`])

pub mod blend;
pub mod traits;
mod still;

pub use blend::{overlay, Region};
pub use still::{ImageCompositor, StillEncoding};
pub use traits::Compositor;
