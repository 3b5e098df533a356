use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::config::VideoConfig;
use crate::error::{Result, VideoError};
use crate::video::reader::drain_stderr;
use crate::video::types::{Frame, VideoMetadata};

/// Encoders that take a constant rate factor
const CRF_ENCODERS: &[&str] = &["libx264", "libx265", "libvpx-vp9", "libaom-av1", "libsvtav1"];

/// Anything that accepts watermarked frames in order
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
}

impl FrameSink for Vec<Frame> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.push(frame.clone());
        Ok(())
    }
}

/// Frame sink backed by an `ffmpeg` encode process.
///
/// The output only counts as written once [`FrameWriter::finish`] succeeds.
/// A writer dropped before that stops the encoder and deletes the partial
/// file.
pub struct FrameWriter {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: Option<JoinHandle<String>>,
    output: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
    finished: bool,
}

impl FrameWriter {
    /// Start an encoder producing `output` at the source's size and frame rate
    pub fn open(config: &VideoConfig, output: &Path, metadata: &VideoMetadata) -> Result<Self> {
        let codec = config.codec_for(output);
        let write_failed = |reason: String| VideoError::WriteFailed {
            path: output.display().to_string(),
            reason,
        };

        let mut cmd = Command::new(&config.ffmpeg);
        cmd.args(["-v", "error", "-nostdin", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", format!("{}x{}", metadata.width, metadata.height).as_str()])
            .args(["-framerate", metadata.fps.to_string().as_str()])
            .args(["-i", "-", "-an"])
            .args(["-c:v", codec, "-pix_fmt", config.pixel_format.as_str()]);

        if CRF_ENCODERS.contains(&codec) {
            cmd.args(["-crf", config.crf().to_string().as_str()]);
            if codec == "libvpx-vp9" {
                cmd.args(["-b:v", "0"]);
            }
        } else {
            cmd.args(["-q:v", qscale(config.quality).to_string().as_str()]);
        }

        let mut child = cmd
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| write_failed(format!("could not run {}: {}", config.ffmpeg, e)))?;

        let stdin = child.stdin.take().map(BufWriter::new);
        let stderr = child.stderr.take().map(drain_stderr);

        debug!(
            "Encoding {} with {} at {}x{} {} fps",
            output.display(),
            codec,
            metadata.width,
            metadata.height,
            metadata.fps
        );

        Ok(Self {
            child,
            stdin,
            stderr,
            output: output.to_path_buf(),
            width: metadata.width,
            height: metadata.height,
            frames_written: 0,
            finished: false,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(VideoError::InvalidParameters {
                details: format!(
                    "frame is {}x{}, encoder expects {}x{}",
                    frame.width(),
                    frame.height(),
                    self.width,
                    self.height
                ),
            }
            .into());
        }

        let bytes = frame.to_rgb_bytes();
        let written = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(&bytes).map_err(|e| e.to_string()),
            None => Err("encoder input closed".to_string()),
        };

        if let Err(reason) = written {
            return Err(self.failure(reason));
        }

        self.frames_written += 1;
        Ok(())
    }

    /// Flush the remaining frames and wait for the encoder to finalize the file
    pub fn finish(mut self) -> Result<u64> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.flush() {
                return Err(self.failure(e.to_string()));
            }
        }

        let status = self.child.wait().map_err(|e| self.write_failed(e.to_string()))?;
        let stderr = self.collect_stderr();

        if !status.success() {
            return Err(self.write_failed(format!("encoder exited with {}: {}", status, stderr.trim())).into());
        }

        self.finished = true;
        Ok(self.frames_written)
    }

    fn write_failed(&self, reason: String) -> VideoError {
        VideoError::WriteFailed {
            path: self.output.display().to_string(),
            reason,
        }
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Shut the encoder down after a pipe error and report what it said
    fn failure(&mut self, reason: String) -> crate::error::WatermarkError {
        self.stdin = None;
        let _ = self.child.wait();
        let stderr = self.collect_stderr();
        let reason = match stderr.trim() {
            "" => reason,
            detail => format!("{} ({})", reason, detail),
        };
        self.write_failed(reason).into()
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        self.stdin = None;
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();

        if self.output.exists() {
            match std::fs::remove_file(&self.output) {
                Ok(()) => debug!("Removed incomplete output {}", self.output.display()),
                Err(e) => warn!("Failed to remove incomplete output {}: {}", self.output.display(), e),
            }
        }
    }
}

impl FrameSink for FrameWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        FrameWriter::write_frame(self, frame)
    }
}

/// Map the 0-100 quality knob onto ffmpeg's 2-31 qscale (lower is better)
fn qscale(quality: u8) -> u8 {
    31 - ((quality.min(100) as u32 * 29) / 100) as u8
}
