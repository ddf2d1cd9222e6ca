//! FFmpeg/FFprobe subprocess utilities for the frame extractor.
//!
//! Uploads are probed with `ffprobe` to confirm a decodable video stream,
//! then decoded sequentially with `ffmpeg` into a dense zero-based frame
//! sequence. Both binaries are invoked via [`tokio::process::Command`].

use std::path::Path;

use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("input has no decodable video stream")]
    NoVideoStream,

    #[error("video produced no frames")]
    NoFrames,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

impl From<FfmpegError> for crate::error::CoreError {
    fn from(err: FfmpegError) -> Self {
        match err {
            // A missing binary is a deployment problem, not a bad upload.
            FfmpegError::NotFound(e) => {
                crate::error::CoreError::Internal(format!("ffmpeg binary not found: {e}"))
            }
            FfmpegError::VideoNotFound(p) => {
                crate::error::CoreError::Internal(format!("video file disappeared: {p}"))
            }
            FfmpegError::IoError(e) => crate::error::CoreError::Io(e),
            other => crate::error::CoreError::Decode(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub nb_frames: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Decode every frame of a video into `out_dir` as `{index:05}.jpg`.
///
/// Indices are dense, zero-based, and gap-free; decoding stops at
/// end-of-stream. Returns the number of frames written. A video that
/// decodes to zero frames is an error: there is nothing to prompt.
pub async fn extract_frames(video_path: &Path, out_dir: &Path) -> Result<u32, FfmpegError> {
    if !video_path.exists() {
        return Err(FfmpegError::VideoNotFound(
            video_path.to_string_lossy().to_string(),
        ));
    }

    tokio::fs::create_dir_all(out_dir).await?;

    // ffmpeg numbers image2 output from 1 by default; the frame contract
    // is zero-based.
    let pattern = out_dir.join("%05d.jpg");
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(video_path)
        .args(["-start_number", "0", "-q:v", "2"])
        .arg(&pattern)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let count = count_dense_frames(out_dir);
    if count == 0 {
        return Err(FfmpegError::NoFrames);
    }

    Ok(count)
}

/// Walk the dense `{index:05}.jpg` sequence from 0 until the first gap.
fn count_dense_frames(dir: &Path) -> u32 {
    let mut count = 0u32;
    while dir.join(frame_file_name(count)).exists() {
        count += 1;
    }
    count
}

/// Canonical file name of the frame at `index`.
pub fn frame_file_name(index: u32) -> String {
    format!("{index:05}.jpg")
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Whether the probed input contains at least one video stream.
pub fn has_video_stream(probe: &FfprobeOutput) -> bool {
    first_video_stream(probe).is_some()
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Try format-level duration first.
    if let Some(d) = &probe.format.duration {
        if let Ok(secs) = d.parse::<f64>() {
            return secs;
        }
    }
    // Fall back to the first video stream's duration.
    if let Some(stream) = first_video_stream(probe) {
        if let Some(d) = &stream.duration {
            if let Ok(secs) = d.parse::<f64>() {
                return secs;
            }
        }
    }
    0.0
}

/// Parse the video framerate from ffprobe output.
///
/// The `r_frame_rate` field is a fraction like `"30/1"` or `"24000/1001"`.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    first_video_stream(probe)
        .and_then(|s| s.r_frame_rate.as_deref())
        .map(parse_fraction)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(1.0);
        if den > 0.0 {
            return num / den;
        }
    }
    s.parse::<f64>().unwrap_or(0.0)
}

/// Estimate total frames from ffprobe output.
pub fn parse_total_frames(probe: &FfprobeOutput) -> i64 {
    if let Some(stream) = first_video_stream(probe) {
        if let Some(nb) = &stream.nb_frames {
            if let Ok(n) = nb.parse::<i64>() {
                return n;
            }
        }
    }
    // Estimate from duration * framerate.
    let duration = parse_duration(probe);
    let fps = parse_framerate(probe);
    if duration > 0.0 && fps > 0.0 {
        return (duration * fps).round() as i64;
    }
    0
}

/// Find the first video stream's codec name.
pub fn parse_video_codec(probe: &FfprobeOutput) -> String {
    first_video_stream(probe)
        .and_then(|s| s.codec_name.clone())
        .unwrap_or_default()
}

/// Find the first video stream's resolution.
pub fn parse_resolution(probe: &FfprobeOutput) -> (i32, i32) {
    first_video_stream(probe)
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0))
}
