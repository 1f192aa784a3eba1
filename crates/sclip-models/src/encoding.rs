//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Story frame (9:16 vertical)
pub const STORY_WIDTH: u32 = 1080;
pub const STORY_HEIGHT: u32 = 1920;

/// Output frame dimensions. Every clip of a job has exactly this size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self {
            width: STORY_WIDTH,
            height: STORY_HEIGHT,
        }
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Use hardware acceleration (NVENC)
    #[serde(default)]
    pub use_nvenc: bool,

    /// Move the moov atom to the front for progressive playback
    #[serde(default = "default_faststart")]
    pub faststart: bool,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_faststart() -> bool {
    true
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            use_nvenc: false,
            faststart: true,
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// High quality, slower encode.
    pub fn story_high() -> Self {
        Self {
            preset: "slow".to_string(),
            crf: 18,
            audio_bitrate: "192k".to_string(),
            ..Default::default()
        }
    }

    /// Fast encode for previews.
    pub fn story_fast() -> Self {
        Self {
            preset: "veryfast".to_string(),
            crf: 28,
            audio_bitrate: "96k".to_string(),
            ..Default::default()
        }
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Enable NVENC hardware acceleration.
    pub fn with_nvenc(mut self) -> Self {
        self.use_nvenc = true;
        self.codec = "h264_nvenc".to_string();
        self
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];

        // CRF is not used with NVENC, use -cq instead
        if self.use_nvenc {
            args.extend_from_slice(&["-cq".to_string(), self.crf.to_string()]);
        } else {
            args.extend_from_slice(&["-crf".to_string(), self.crf.to_string()]);
        }

        args.extend_from_slice(&[
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]);

        if self.faststart {
            args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        }

        args
    }

    /// Render as a single preset string (space separated).
    pub fn to_preset_string(&self) -> String {
        self.to_ffmpeg_args().join(" ")
    }
}
