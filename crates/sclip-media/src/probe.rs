//! FFprobe source information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Source video information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// Whether an audio stream is present
    pub has_audio: bool,
}

/// Source of duration/metadata for input references.
#[async_trait]
pub trait SourceProbe: Send + Sync {
    async fn probe(&self, input: &str) -> MediaResult<VideoInfo>;
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// [`SourceProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: String,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl SourceProbe for FfprobeProbe {
    async fn probe(&self, input: &str) -> MediaResult<VideoInfo> {
        if !is_remote(input) && !Path::new(input).exists() {
            return Err(MediaError::FileNotFound(input.into()));
        }

        let program = which::which(&self.program)
            .map_err(|_| MediaError::FfprobeNotFound(self.program.clone()))?;

        let output = Command::new(program)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: "FFprobe failed".to_string(),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        parse_probe_output(&output.stdout)
    }
}

/// Whether an input reference is a URL rather than a local path.
pub fn is_remote(input: &str) -> bool {
    Url::parse(input)
        .map(|u| matches!(u.scheme(), "http" | "https" | "rtmp" | "rtsp"))
        .unwrap_or(false)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::InvalidVideo("Source has no usable duration".to_string()))?;

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .or(video_stream.r_frame_rate.as_ref())
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
