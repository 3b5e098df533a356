use thiserror::Error;

/// Main error type for the watermark compositor
#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Logo error: {0}")]
    Asset(#[from] AssetError),

    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Logo loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Logo file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to decode logo {path}: {reason}")]
    DecodeFailed { path: String, reason: String },
}

/// Still image errors
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to decode image {path}: {reason}")]
    DecodeFailed { path: String, reason: String },

    #[error("Failed to encode image {path}: {reason}")]
    EncodeFailed { path: String, reason: String },
}

/// Video-specific errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to open video {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Failed to write video {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Output location errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    #[error("Output directory {path} is not usable: {reason}")]
    OutputDirUnavailable { path: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using WatermarkError
pub type Result<T> = std::result::Result<T, WatermarkError>;

impl WatermarkError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether this error only concerns the file being processed.
    ///
    /// Per-item errors are reported and the batch moves on. Everything else
    /// (missing logo, bad config, unusable output directory) stops the batch,
    /// before it starts or at the file where it surfaced.
    pub fn is_per_item(&self) -> bool {
        match self {
            Self::Image(_) | Self::Video(_) | Self::Io(_) | Self::Generic(_) => true,
            Self::Asset(_) | Self::Config(_) | Self::Filesystem(_) => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Asset(AssetError::NotFound { path }) => {
                format!("Logo '{}' not found. Select an existing logo file first.", path)
            }
            Self::Asset(AssetError::DecodeFailed { path, .. }) => {
                format!("Could not read logo '{}'. Please use a PNG, JPEG or WebP file.", path)
            }
            Self::Video(VideoError::WriteFailed { path, reason }) => {
                format!("Could not write video '{}': {}. Check that FFmpeg supports this container.", path, reason)
            }
            Self::Filesystem(FilesystemError::OutputDirUnavailable { path, .. }) => {
                format!("Output folder '{}' cannot be created or written.", path)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
