use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, VideoError};
use crate::video::types::{FrameRate, VideoMetadata};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    nb_frames: Option<String>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    #[serde(default)]
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    #[serde(default)]
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees, normalized to 0..360. Older muxers write a
    /// `rotate` tag, newer ones a display matrix side data entry.
    fn rotation(&self) -> i64 {
        let tagged = self
            .tags
            .as_ref()
            .and_then(|tags| tags.rotate.as_deref())
            .and_then(|r| r.trim().parse::<f64>().ok());
        let matrix = self.side_data_list.iter().find_map(|side| side.rotation);
        let degrees = matrix.or(tagged).unwrap_or(0.0).round() as i64;
        degrees.rem_euclid(360)
    }
}

/// Read the first video stream's parameters with `ffprobe`
pub fn probe(ffprobe: &str, path: &Path) -> Result<VideoMetadata> {
    let open_failed = |reason: String| VideoError::OpenFailed {
        path: path.display().to_string(),
        reason,
    };

    let output = Command::new(ffprobe)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=codec_name,width,height,avg_frame_rate,r_frame_rate,nb_frames\
                :stream_tags=rotate:stream_side_data=rotation",
            "-of", "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| open_failed(format!("could not run {}: {}", ffprobe, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(open_failed(stderr.trim().to_string()).into());
    }

    let metadata = parse_probe_json(&output.stdout).map_err(open_failed)?;
    debug!(
        "Probed {}: {}x{} @ {} fps ({})",
        path.display(),
        metadata.width,
        metadata.height,
        metadata.fps,
        metadata.codec
    );
    Ok(metadata)
}

fn parse_probe_json(json: &[u8]) -> std::result::Result<VideoMetadata, String> {
    let parsed: ProbeOutput = serde_json::from_slice(json).map_err(|e| format!("unreadable ffprobe output: {}", e))?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no frame size".to_string()),
    };
    // ffmpeg autorotates on decode, so quarter turns swap the frame size
    let (width, height) = match stream.rotation() {
        90 | 270 => (height, width),
        _ => (width, height),
    };

    // avg_frame_rate is 0/0 for some containers; r_frame_rate is the fallback
    let fps = [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|rate| rate.parse::<FrameRate>().ok())
        .ok_or_else(|| "video stream has no usable frame rate".to_string())?;

    Ok(VideoMetadata {
        width,
        height,
        fps,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
        frame_count: stream.nb_frames.and_then(|n| n.parse().ok()),
    })
}
