use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

/// Notifications a running batch sends to its observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Enumeration found no supported files; nothing else follows
    NothingToDo,

    /// About to process file `index` (1-based) of `total`
    Progress { index: usize, total: usize, message: String },

    /// One file failed; the batch carries on
    ItemFailed { file_name: String, error: String },

    /// Cancellation was observed with `remaining` files left untouched
    Cancelled { remaining: usize },

    /// Terminal event with the number of files attempted
    Completed { total: usize },
}

impl BatchEvent {
    pub fn progress(index: usize, total: usize, file_name: &str) -> Self {
        Self::Progress {
            index,
            total,
            message: format!("Processing {} ({}/{})", file_name, index, total),
        }
    }

    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NothingToDo | Self::Completed { .. })
    }
}

impl fmt::Display for BatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToDo => write!(f, "No supported media files found"),
            Self::Progress { message, .. } => write!(f, "{}", message),
            Self::ItemFailed { file_name, error } => write!(f, "Failed {}: {}", file_name, error),
            Self::Cancelled { remaining } => write!(f, "Cancelled, {} files skipped", remaining),
            Self::Completed { total } => write!(f, "Completed {} files", total),
        }
    }
}

/// Receives batch events on the worker thread; must never block for long
pub trait EventSink: Send {
    fn emit(&self, event: BatchEvent);
}

impl EventSink for UnboundedSender<BatchEvent> {
    fn emit(&self, event: BatchEvent) {
        // A dropped receiver only means nobody is watching
        let _ = self.send(event);
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<BatchEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_events(self) -> Vec<BatchEvent> {
        self.events.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: BatchEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// One file that could not be watermarked
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Files that were started, whatever their outcome
    pub attempted: usize,

    /// `(input, written output)` pairs
    pub succeeded: Vec<(PathBuf, PathBuf)>,

    pub failed: Vec<ItemFailure>,

    pub cancelled: bool,

    /// Set when an error outside any single file stopped the batch early
    pub aborted: Option<String>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled && self.aborted.is_none()
    }
}
