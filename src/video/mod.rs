//! # Video Processing Module
//!
//! Decodes videos frame by frame, blends the logo into each frame and
//! re-encodes at the source frame rate, using the `ffmpeg`/`ffprobe` tools.

pub mod types;

mod compositor;
mod probe;
mod reader;
mod writer;

pub use compositor::{stamp_frames, VideoCompositor};
pub use probe::probe;
pub use reader::FrameReader;
pub use types::{EncodedVideo, Frame, FrameRate, VideoMetadata};
pub use writer::{FrameSink, FrameWriter};
