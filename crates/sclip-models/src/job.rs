//! Job record and its poll view.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{ClipArtifact, IdempotencyKey, JobStatus, ModelError, ModelResult, ProcessingOptions};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end-to-end request to turn a source video into clips.
///
/// Exactly one record exists per idempotency key. Only the task that created
/// the record mutates it, and terminal records are never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Deduplication identity
    pub idempotency_key: IdempotencyKey,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100), non-decreasing while running
    #[serde(default)]
    pub progress: u8,

    /// Source video path or URL
    pub input_ref: String,

    /// Normalized processing options
    pub options: ProcessingOptions,

    /// Generated clips, in index order
    #[serde(default)]
    pub outputs: Vec<ClipArtifact>,

    /// Error message (only in `error`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Finished at timestamp (done or error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        idempotency_key: IdempotencyKey,
        input_ref: impl Into<String>,
        options: ProcessingOptions,
    ) -> Self {
        Self {
            id: JobId::new(),
            idempotency_key,
            status: JobStatus::Queued,
            progress: 0,
            input_ref: input_ref.into(),
            options,
            outputs: Vec::new(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Create a job that is admitted straight into `running`.
    ///
    /// Stores insert this under their create lock so no caller observes a
    /// queued record for a key that already has an owner.
    pub fn started(
        idempotency_key: IdempotencyKey,
        input_ref: impl Into<String>,
        options: ProcessingOptions,
    ) -> Self {
        let mut job = Self::new(idempotency_key, input_ref, options);
        job.status = JobStatus::Running;
        job.started_at = Some(job.created_at);
        job
    }

    fn transition(&mut self, to: JobStatus) -> ModelResult<()> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Error)
                | (JobStatus::Running, JobStatus::Done)
                | (JobStatus::Running, JobStatus::Error)
        );
        if !allowed {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Mark as running.
    pub fn start(&mut self) -> ModelResult<()> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark as done with the generated outputs.
    pub fn complete(&mut self, outputs: Vec<ClipArtifact>) -> ModelResult<()> {
        self.transition(JobStatus::Done)?;
        self.outputs = outputs;
        self.progress = 100;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Mark as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(JobStatus::Error)?;
        self.error_message = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Update progress while running. Returns `true` if the value moved.
    ///
    /// Values are capped at 100 and never decrease.
    pub fn set_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.status != JobStatus::Running || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    /// Build the poll view of this job.
    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            outputs: self.outputs.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Status-poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub outputs: Vec<ClipArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
