//! Status notifications emitted on job transitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Job, JobId, JobStatus};

/// Which transition produced a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusEventKind {
    /// Record created
    Queued,
    /// Work started
    Running,
    /// Progress moved forward
    Progress,
    /// All clips rendered
    Done,
    /// Job failed
    Error,
}

impl StatusEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusEventKind::Queued => "queued",
            StatusEventKind::Running => "running",
            StatusEventKind::Progress => "progress",
            StatusEventKind::Done => "done",
            StatusEventKind::Error => "error",
        }
    }
}

/// One status notification. Events of a job carry strictly increasing `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub job_id: JobId,
    pub seq: u64,
    pub kind: StatusEventKind,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// Snapshot a job into an event of the given kind.
    pub fn from_job(job: &Job, seq: u64, kind: StatusEventKind) -> Self {
        Self {
            job_id: job.id.clone(),
            seq,
            kind,
            status: job.status,
            progress: job.progress,
            message: job.error_message.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
