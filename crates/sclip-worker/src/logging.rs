//! Per-job log context.
//!
//! Every line a job writes carries its id and idempotency key, and the
//! background task runs inside [`JobLogger::span`], so one grep on either
//! value recovers the whole lifecycle.

use sclip_models::{ClipArtifact, IdempotencyKey, Job, JobId, ModelError, StatusEventKind};
use tracing::{error, info, warn, Span};

use crate::error::WorkerError;

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    key: IdempotencyKey,
}

impl JobLogger {
    pub fn new(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            key: job.idempotency_key.clone(),
        }
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("story_job", job_id = %self.job_id, key = %self.key)
    }

    pub fn started(&self, job: &Job) {
        info!(
            job_id = %self.job_id,
            key = %self.key,
            input = %job.input_ref,
            mode = job.options.mode.as_str(),
            "Job running"
        );
    }

    pub fn progress(&self, progress: u8, message: &str) {
        info!(job_id = %self.job_id, progress, "{}", message);
    }

    pub fn clip_rendered(&self, artifact: &ClipArtifact, total: usize) {
        info!(
            job_id = %self.job_id,
            clip = artifact.index,
            total,
            size = %artifact.size_formatted(),
            "Clip rendered"
        );
    }

    /// A status event the sink refused; the job carries on.
    pub fn event_dropped(&self, kind: StatusEventKind, err: &WorkerError) {
        warn!(job_id = %self.job_id, event = kind.as_str(), error = %err, "Status event not delivered");
    }

    pub fn persist_failed(&self, err: &WorkerError) {
        warn!(job_id = %self.job_id, error = %err, "Failed to persist job state");
    }

    pub fn failed(&self, err: &WorkerError) {
        error!(job_id = %self.job_id, kind = err.kind(), error = %err, "Job failed");
    }

    /// The record refused a transition, so the outcome could not be stored.
    pub fn state_conflict(&self, err: &ModelError) {
        error!(job_id = %self.job_id, kind = "state", error = %err, "Job state conflict");
    }

    pub fn finished(&self, clips: usize, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            clips,
            elapsed_secs,
            "Job done"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use sclip_media::MediaError;
    use sclip_models::ProcessingOptions;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failure_line_carries_job_context() {
        let job = Job::started(
            IdempotencyKey::new("logs:1").unwrap(),
            "in.mp4",
            ProcessingOptions::default(),
        );
        let logger = JobLogger::new(&job);
        let err = WorkerError::clip(2, MediaError::Timeout(Duration::from_secs(60)));

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let _span = logger.span().entered();
            logger.failed(&err);
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(&format!("job_id={}", job.id)));
        assert!(output.contains("key=logs:1"));
        assert!(output.contains("kind=\"timeout\""));
        assert!(output.contains("Job failed"));
    }
}
