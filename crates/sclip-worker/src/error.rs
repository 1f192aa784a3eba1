//! Worker error types.

use sclip_media::{FilterError, MediaError, PlanError, SanitizeError};
use sclip_models::ModelError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    Plan(#[from] PlanError),

    #[error("Rejected preset: {0}")]
    Sanitize(#[from] SanitizeError),

    #[error("Clip {index}: rejected effect: {source}")]
    Filter { index: u32, source: FilterError },

    #[error("Clip {index} failed ({}): {source}", clip_failure_kind(.source))]
    Clip { index: u32, source: MediaError },

    #[error("Source probe failed: {0}")]
    Probe(MediaError),

    #[error("Job state error: {0}")]
    Model(#[from] ModelError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Status notification failed: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn clip(index: u32, source: MediaError) -> Self {
        Self::Clip { index, source }
    }

    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Failure class reported in job error messages and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) | WorkerError::Plan(_) => "validation",
            WorkerError::Sanitize(_) | WorkerError::Filter { .. } => "sanitization",
            WorkerError::Clip { source, .. } => clip_failure_kind(source),
            WorkerError::Probe(_) => "probe failure",
            WorkerError::Model(_) | WorkerError::NotFound(_) => "state",
            WorkerError::Notify(_) | WorkerError::ConfigError(_) | WorkerError::Io(_) => {
                "internal"
            }
        }
    }

    /// Whether the job failed before any subprocess ran.
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            WorkerError::Validation(_)
                | WorkerError::Plan(_)
                | WorkerError::Sanitize(_)
                | WorkerError::Filter { .. }
                | WorkerError::Probe(_)
        )
    }
}

fn clip_failure_kind(source: &MediaError) -> &'static str {
    match source {
        MediaError::Timeout(_) => "timeout",
        MediaError::Filter(_) | MediaError::Sanitize(_) => "sanitization",
        _ => "subprocess failure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_kind_classification() {
        let timeout = WorkerError::clip(3, MediaError::Timeout(Duration::from_secs(60)));
        assert_eq!(timeout.kind(), "timeout");
        assert!(timeout.to_string().starts_with("Clip 3 failed (timeout)"));

        let empty = WorkerError::clip(2, MediaError::EmptyOutput(PathBuf::from("clip_002.mp4")));
        assert_eq!(empty.kind(), "subprocess failure");

        let plan = WorkerError::from(PlanError::NoValidClips);
        assert_eq!(plan.kind(), "validation");
        assert!(plan.is_pre_execution());

        let preset = WorkerError::from(SanitizeError::DanglingEscape);
        assert_eq!(preset.kind(), "sanitization");
        assert!(!timeout.is_pre_execution());
    }
}
