//! # Media Discovery
//!
//! Expands dropped/selected paths into the flat, ordered list of files a
//! batch will process.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use tracing::{debug, info};

/// Extensions handled by the still image compositor
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions handled by the video compositor
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "wmv"];

/// Which compositor a file goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify by extension first, then by the MIME type guessed from the name
    pub fn detect(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        if let Some(ext) = extension.as_deref() {
            if IMAGE_EXTENSIONS.contains(&ext) {
                return Some(Self::Image);
            }
            if VIDEO_EXTENSIONS.contains(&ext) {
                return Some(Self::Video);
            }
        }

        mime_guess::from_path(path)
            .iter()
            .find_map(|mime| match mime.type_().as_str() {
                "image" => Some(Self::Image),
                "video" => Some(Self::Video),
                _ => None,
            })
    }
}

/// One file queued for watermarking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Option<Self> {
        let path = path.into();
        MediaKind::detect(&path).map(|kind| Self { path, kind })
    }

    /// File name for progress and error messages
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Expand `paths` into supported media files.
///
/// Directories are walked recursively in sorted order; plain files are kept
/// as given. Unsupported or missing entries are dropped without error. The
/// result preserves the order of `paths`.
pub fn enumerate<P: AsRef<Path>>(paths: &[P]) -> Vec<MediaFile> {
    let mut files = Vec::new();

    for path in paths {
        let path = path.as_ref();

        if path.is_dir() {
            let found = WalkDir::new(path)
                .sort(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| MediaFile::from_path(entry.path()));

            let before = files.len();
            files.extend(found);
            debug!("{}: {} media files", path.display(), files.len() - before);
        } else if path.is_file() {
            match MediaFile::from_path(path) {
                Some(file) => files.push(file),
                None => debug!("Skipping unsupported file {}", path.display()),
            }
        } else {
            debug!("Skipping missing path {}", path.display());
        }
    }

    info!("Enumerated {} media files from {} input paths", files.len(), paths.len());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(MediaKind::detect(Path::new("a.PNG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::detect(Path::new("a.jpeg")), Some(MediaKind::Image));
        assert_eq!(MediaKind::detect(Path::new("clip.MkV")), Some(MediaKind::Video));
        assert_eq!(MediaKind::detect(Path::new("clip.wmv")), Some(MediaKind::Video));
        assert_eq!(MediaKind::detect(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::detect(Path::new("no_extension")), None);
    }

    #[test]
    fn test_detect_by_mime_fallback() {
        assert_eq!(MediaKind::detect(Path::new("scan.bmp")), Some(MediaKind::Image));
        assert_eq!(MediaKind::detect(Path::new("old.mpeg")), Some(MediaKind::Video));
    }

    #[test]
    fn test_directory_with_mixed_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"").unwrap();
        std::fs::write(dir.path().join("c.mp4"), b"").unwrap();

        let files = enumerate(&[dir.path()]);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].kind, MediaKind::Image);
        assert_eq!(files[1].kind, MediaKind::Video);
    }

    #[test]
    fn test_order_follows_inputs_then_traversal() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("z.jpg"), b"").unwrap();
        std::fs::write(nested.join("m.jpg"), b"").unwrap();
        let loose = dir.path().join("loose.mov");
        std::fs::write(&loose, b"").unwrap();

        let files = enumerate(&[loose.clone(), dir.path().join("nested")]);
        let names: Vec<String> = files.iter().map(|f| f.display_name()).collect();
        assert_eq!(names, vec!["loose.mov", "m.jpg", "z.jpg"]);
    }

    #[test]
    fn test_missing_and_unsupported_are_skipped() {
        let dir = tempdir().unwrap();
        let text = dir.path().join("readme.txt");
        std::fs::write(&text, b"").unwrap();

        let files = enumerate(&[text, dir.path().join("ghost.png")]);
        assert!(files.is_empty());
    }
}
