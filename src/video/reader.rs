use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{Result, VideoError};
use crate::video::types::{Frame, VideoMetadata};

/// Sequential frame source backed by an `ffmpeg` decode process.
///
/// Frames are pulled one at a time, so memory use stays at a single frame
/// no matter how long the video is. Dropping the reader early stops the
/// decoder.
pub struct FrameReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frame_len: usize,
    frames_read: u64,
    done: bool,
    reaped: bool,
    source: String,
}

impl FrameReader {
    pub fn open(ffmpeg: &str, path: &Path, metadata: &VideoMetadata) -> Result<Self> {
        let source = path.display().to_string();

        let mut child = Command::new(ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VideoError::OpenFailed {
                path: source.clone(),
                reason: format!("could not run {}: {}", ffmpeg, e),
            })?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VideoError::OpenFailed {
                    path: source,
                    reason: "decoder output unavailable".to_string(),
                }
                .into());
            }
        };
        let stderr = child.stderr.take().map(drain_stderr);

        debug!("Decoding {} as {}x{} rgb24", source, metadata.width, metadata.height);

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            width: metadata.width,
            height: metadata.height,
            frame_len: metadata.rgb_frame_len(),
            frames_read: 0,
            done: false,
            reaped: false,
            source,
        })
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut data = vec![0u8; self.frame_len];
        let mut filled = 0;

        while filled < self.frame_len {
            match self.stdout.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VideoError::DecodingFailed {
                        reason: format!("{}: {}", self.source, e),
                    }
                    .into())
                }
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < self.frame_len {
            return Err(VideoError::DecodingFailed {
                reason: format!(
                    "{}: truncated frame {} ({} of {} bytes)",
                    self.source, self.frames_read, filled, self.frame_len
                ),
            }
            .into());
        }

        let frame = Frame::from_rgb_bytes(self.width, self.height, data).ok_or_else(|| VideoError::DecodingFailed {
            reason: format!("{}: frame buffer size mismatch", self.source),
        })?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    /// Wait for the decoder and report whether it ended cleanly
    pub fn close(mut self) -> Result<u64> {
        let status = self.child.wait()?;
        self.reaped = true;
        let stderr = self.stderr.take().and_then(|handle| handle.join().ok()).unwrap_or_default();

        if !status.success() {
            return Err(VideoError::DecodingFailed {
                reason: format!("{}: decoder exited with {}: {}", self.source, status, stderr.trim()),
            }
            .into());
        }
        if self.frames_read == 0 {
            return Err(VideoError::DecodingFailed {
                reason: format!("{}: no frames decoded", self.source),
            }
            .into());
        }

        Ok(self.frames_read)
    }
}

impl Iterator for FrameReader {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!("Failed to stop decoder for {}: {}", self.source, e);
            }
        }
        let _ = self.child.wait();
    }
}

/// Collect a child's stderr on a helper thread so a chatty process never
/// blocks on a full pipe
pub(crate) fn drain_stderr<R: Read + Send + 'static>(mut stderr: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text);
        text
    })
}
