//! # Batch Processing
//!
//! Runs a list of dropped files through the matching compositor one at a
//! time on a background worker, reporting progress over a channel.

pub mod events;
mod pipeline;

pub use events::{BatchEvent, BatchReport, EventLog, EventSink, ItemFailure};
pub use pipeline::{BatchHandle, BatchPipeline, CancelToken};
