//! # Output Locations
//!
//! Output directory preparation and collision-free file naming.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FilesystemError, Result};

/// Picks output paths that do not overwrite existing files.
///
/// Uniqueness is checked against the filesystem at call time only; two
/// processes writing into the same directory at once can still race.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputPathAllocator;

impl OutputPathAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Return `desired` if it is free, otherwise the first free
    /// `<stem>_watermarked_<n><.ext>` with `n` counting up from 1
    pub fn allocate(&self, desired: &Path) -> PathBuf {
        if !desired.exists() {
            return desired.to_path_buf();
        }

        let stem = desired
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = desired
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut counter: u64 = 1;
        loop {
            let candidate = desired.with_file_name(format!("{}_watermarked_{}{}", stem, counter, extension));
            if !candidate.exists() {
                debug!("{} exists, using {}", desired.display(), candidate.display());
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Make sure the output directory exists and is a directory
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    let unavailable = |reason: String| FilesystemError::OutputDirUnavailable {
        path: dir.display().to_string(),
        reason,
    };

    std::fs::create_dir_all(dir).map_err(|e| unavailable(e.to_string()))?;

    let metadata = std::fs::metadata(dir).map_err(|e| unavailable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable("not a directory".to_string()).into());
    }
    if metadata.permissions().readonly() {
        return Err(unavailable("directory is read-only".to_string()).into());
    }

    Ok(())
}
