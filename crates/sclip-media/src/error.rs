//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing or transcoding.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFprobe not found: {0}")]
    FfprobeNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Output missing or empty: {0}")]
    EmptyOutput(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Indicator rendering failed: {0}")]
    Indicator(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an indicator rendering error.
    pub fn indicator(message: impl Into<String>) -> Self {
        Self::Indicator(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short failure kind, used in job error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::Timeout(_) => "timeout",
            MediaError::FfmpegFailed { .. } => "subprocess failure",
            MediaError::EmptyOutput(_) => "empty output",
            MediaError::Filter(_) | MediaError::Sanitize(_) => "sanitization",
            MediaError::FfmpegNotFound(_) | MediaError::FfprobeNotFound(_) => "missing tool",
            _ => "media error",
        }
    }
}

/// Distribution planning errors. All of them fail a job before any clip runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("clip duration must be in (0, {max}] seconds, got {value}")]
    ClipDuration { value: f64, max: f64 },

    #[error("max clips must be in 1..={max}, got {value}")]
    MaxClips { value: u32, max: u32 },

    #[error("clip duration {clip_duration}s exceeds source duration {source_duration}s")]
    ClipLongerThanSource {
        clip_duration: f64,
        source_duration: f64,
    },

    #[error("source duration must be positive, got {0}")]
    SourceDuration(f64),

    #[error("no valid clip ranges in manual plan")]
    NoValidClips,
}

/// Filter compilation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("color formula contains forbidden character {found:?}")]
    UnsafeFormula { found: char },

    #[error("color formula is empty")]
    EmptyFormula,

    #[error("color formula uses {0:?}, which changes the frame size")]
    GeometryFormula(String),

    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),
}

/// Preset sanitization errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("unterminated {0} quote in preset")]
    UnterminatedQuote(char),

    #[error("preset ends with a dangling escape")]
    DanglingEscape,

    #[error("preset contains control character U+{0:04X}")]
    ControlCharacter(u32),

    #[error("extracted {flag} filter contains forbidden character {found:?}")]
    UnsafeFilter { flag: &'static str, found: char },
}
