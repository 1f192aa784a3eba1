//! Story clip job orchestration.
//!
//! `submit` is deterministic per idempotency key: a known key returns the
//! stored record untouched, a new key creates exactly one record and runs it
//! on a background task. Execution plans the clips, compiles every filter
//! graph and sanitizes the preset before the first subprocess, then renders
//! clips one at a time in index order. The first clip failure ends the job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use sclip_media::distribution::{self, PlanRequest};
use sclip_media::{
    compile, ClipRenderer, ClipRequest, FilterGraph, PlanError, PresetCatalog, SourceProbe,
};
use sclip_models::{
    resolve_effects, ClipArtifact, FrameSize, IdempotencyKey, Job, JobStatus, JobView,
    ProcessingOptions, StatusEvent, StatusEventKind,
};
use tracing::Instrument;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::events::StatusSink;
use crate::logging::JobLogger;
use crate::store::{Admission, JobStore};

/// Progress checkpoints.
const PROGRESS_STARTED: u8 = 5;
const PROGRESS_PLANNED: u8 = 10;
const PROGRESS_CLIP_SPAN: usize = 85;

/// Metric names.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "sclip_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "sclip_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "sclip_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "sclip_job_duration_seconds";
}

/// Owns job records and drives their execution.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    probe: Arc<dyn SourceProbe>,
    renderer: Arc<dyn ClipRenderer>,
    sink: Arc<dyn StatusSink>,
    presets: Arc<PresetCatalog>,
    work_dir: PathBuf,
    frame: FrameSize,
    poll_interval: Duration,
}

impl Orchestrator {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<dyn JobStore>,
        probe: Arc<dyn SourceProbe>,
        renderer: Arc<dyn ClipRenderer>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            store,
            probe,
            renderer,
            sink,
            presets: Arc::new(PresetCatalog::default()),
            work_dir: config.work_dir.clone(),
            frame: config.frame,
            poll_interval: config.poll_interval,
        }
    }

    /// Replace the named preset catalog.
    pub fn with_presets(mut self, presets: PresetCatalog) -> Self {
        self.presets = Arc::new(presets);
        self
    }

    /// Submit a job, or return the existing one for `key`.
    pub async fn submit(
        &self,
        key: IdempotencyKey,
        input_ref: &str,
        options: ProcessingOptions,
    ) -> WorkerResult<JobView> {
        let input_ref = input_ref.trim();
        if input_ref.is_empty() {
            return Err(WorkerError::validation("input reference is empty"));
        }

        let job = match self.store.create_or_get(&key, input_ref, &options).await {
            Admission::Existing(job) => {
                tracing::debug!(
                    job_id = %job.id,
                    status = job.status.as_str(),
                    "Returning existing job for key"
                );
                return Ok(job.view());
            }
            Admission::Created(job) => job,
        };

        counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);

        let logger = JobLogger::new(&job);
        let mut run = JobRun {
            seq: 0,
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            logger,
            job,
        };
        // The store admitted the record as running; report both transitions.
        run.emit_queued().await;
        run.emit(StatusEventKind::Running, None).await;
        run.logger.started(&run.job);

        let view = run.job.view();
        let span = run.logger.span();
        let this = self.clone();
        tokio::spawn(async move { this.run_job(run).await }.instrument(span));

        Ok(view)
    }

    /// Current poll view for `key`.
    pub async fn status(&self, key: &IdempotencyKey) -> Option<JobView> {
        self.store.get(key).await.map(|job| job.view())
    }

    /// Full job record for `key`.
    pub async fn job(&self, key: &IdempotencyKey) -> Option<Job> {
        self.store.get(key).await
    }

    /// Poll until the job for `key` is terminal or `timeout` elapses.
    ///
    /// On timeout the latest, still non-terminal view is returned.
    pub async fn wait_for_terminal(
        &self,
        key: &IdempotencyKey,
        timeout: Duration,
    ) -> WorkerResult<JobView> {
        let deadline = Instant::now() + timeout;
        loop {
            let view = self
                .status(key)
                .await
                .ok_or_else(|| WorkerError::NotFound(key.to_string()))?;
            if view.status.is_terminal() || Instant::now() >= deadline {
                return Ok(view);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn run_job(&self, mut run: JobRun) {
        let started = Instant::now();
        let result = self.execute(&mut run).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(outputs) => {
                let count = outputs.len();
                if let Err(e) = run.job.complete(outputs) {
                    run.logger.state_conflict(&e);
                    return;
                }
                run.save_and_emit(StatusEventKind::Done, None).await;
                run.logger.finished(count, elapsed);

                counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
                histogram!(names::JOB_DURATION_SECONDS, &[("status", "done".to_string())])
                    .record(elapsed);
            }
            Err(e) => {
                let kind = e.kind();
                run.logger.failed(&e);
                if let Err(state) = run.job.fail(e.to_string()) {
                    run.logger.state_conflict(&state);
                    return;
                }
                run.save_and_emit(StatusEventKind::Error, None).await;

                counter!(names::JOBS_FAILED_TOTAL, &[("kind", kind.to_string())]).increment(1);
                histogram!(names::JOB_DURATION_SECONDS, &[("status", "error".to_string())])
                    .record(elapsed);
            }
        }
    }

    async fn execute(&self, run: &mut JobRun) -> WorkerResult<Vec<ClipArtifact>> {
        let input = run.job.input_ref.clone();
        let options = run.job.options.clone();

        run.progress(PROGRESS_STARTED, "probing source").await;
        let info = self
            .probe
            .probe(&input)
            .await
            .map_err(WorkerError::Probe)?;

        let preset = self.presets.sanitize(options.preset.as_deref())?;

        let request = PlanRequest::from_options(info.duration, &options);
        let plan = {
            let mut rng = rand::rng();
            distribution::plan(&request, &mut rng)?
        };
        if plan.is_empty() {
            return Err(PlanError::NoValidClips.into());
        }

        // Every graph is compiled before the first subprocess starts.
        let graphs = plan
            .clips
            .iter()
            .map(|clip| {
                let effects = resolve_effects(
                    clip.effects.as_ref(),
                    Some(&options.effects),
                    options.legacy_visual.as_ref(),
                );
                compile(&effects, clip, self.frame).map_err(|source| WorkerError::Filter {
                    index: clip.index,
                    source,
                })
            })
            .collect::<WorkerResult<Vec<FilterGraph>>>()?;

        let total = plan.len();
        run.progress(
            PROGRESS_PLANNED,
            &format!(
                "planned {} clips covering {:.0}% of {:.1}s",
                total,
                plan.coverage(),
                info.duration
            ),
        )
        .await;

        let output_dir = self.work_dir.join(run.job.id.as_str());
        tokio::fs::create_dir_all(&output_dir).await?;

        let mut outputs = Vec::with_capacity(total);
        for (i, (clip, graph)) in plan.clips.iter().zip(graphs).enumerate() {
            let request = ClipRequest {
                source: &input,
                source_has_audio: info.has_audio,
                clip,
                output_dir: &output_dir,
            };
            let artifact = self
                .renderer
                .render(request, graph, &preset)
                .await
                .map_err(|e| WorkerError::clip(clip.index, e))?;

            run.logger.clip_rendered(&artifact, total);
            outputs.push(artifact);

            let progress = PROGRESS_PLANNED as usize + PROGRESS_CLIP_SPAN * (i + 1) / total;
            run.progress(progress as u8, &format!("clip {}/{} done", i + 1, total))
                .await;
        }

        Ok(outputs)
    }
}

/// State owned by the task executing one job.
struct JobRun {
    job: Job,
    seq: u64,
    store: Arc<dyn JobStore>,
    sink: Arc<dyn StatusSink>,
    logger: JobLogger,
}

impl JobRun {
    async fn emit(&mut self, kind: StatusEventKind, message: Option<String>) {
        self.seq += 1;
        let mut event = StatusEvent::from_job(&self.job, self.seq, kind);
        if let Some(message) = message {
            event = event.with_message(message);
        }
        self.publish(event).await;
    }

    async fn emit_queued(&mut self) {
        self.seq += 1;
        let mut event = StatusEvent::from_job(&self.job, self.seq, StatusEventKind::Queued);
        event.status = JobStatus::Queued;
        self.publish(event).await;
    }

    async fn publish(&self, event: StatusEvent) {
        if let Err(e) = self.sink.publish(&event).await {
            self.logger.event_dropped(event.kind, &e);
        }
    }

    async fn save_and_emit(&mut self, kind: StatusEventKind, message: Option<String>) {
        if let Err(e) = self.store.update(&self.job).await {
            self.logger.persist_failed(&e);
        }
        self.emit(kind, message).await;
    }

    async fn progress(&mut self, value: u8, message: &str) {
        if !self.job.set_progress(value) {
            return;
        }
        self.logger.progress(value, message);
        self.save_and_emit(StatusEventKind::Progress, Some(message.to_string()))
            .await;
    }
}
