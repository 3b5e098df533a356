use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::{config::WatermarkConfig, error::Result, logo::Logo};

/// Core trait implemented by every media-specific compositor
pub trait Compositor: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// File name the result should get in the output directory.
    ///
    /// The default keeps the source name. Compositors that change the
    /// container override this so the extension matches what they write.
    fn output_file_name(&self, input: &Path) -> OsString {
        input
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("output"))
    }

    /// Watermark `input` and write the result to `output`.
    ///
    /// `output` has already been made unique by the caller. Returns the path
    /// that was actually written.
    fn composite(
        &self,
        input: &Path,
        output: &Path,
        logo: &Logo,
        config: &WatermarkConfig,
    ) -> Result<PathBuf>;
}
