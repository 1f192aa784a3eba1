//! Job processing status.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Job processing status.
///
/// `Done` and `Error` are terminal: once a job reaches either, it is never
/// mutated again.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job record exists but no work has started
    #[default]
    Queued,
    /// Clips are being planned or rendered
    Running,
    /// Every planned clip was rendered
    Done,
    /// A validation, sanitization or clip failure stopped the job
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
