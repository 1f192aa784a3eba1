//! Shared fakes for orchestrator integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sclip_media::{
    ClipRenderer, ClipRequest, FilterGraph, FilterStage, MediaError, MediaResult,
    SanitizedPreset, SourceProbe, VideoInfo,
};
use sclip_models::{ClipArtifact, StatusEvent};
use sclip_worker::{
    EvictionPolicy, InMemoryJobStore, JobStore, Orchestrator, StatusSink, TracingSink,
    WorkerConfig, WorkerResult,
};
use tokio::sync::Semaphore;

/// Probe reporting a fixed duration for every input.
pub struct FakeProbe {
    pub duration: f64,
    pub has_audio: bool,
}

#[async_trait]
impl SourceProbe for FakeProbe {
    async fn probe(&self, _input: &str) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            duration: self.duration,
            width: 1920,
            height: 1080,
            fps: 30.0,
            codec: "h264".to_string(),
            has_audio: self.has_audio,
        })
    }
}

/// What the renderer was asked to do for one clip.
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub index: u32,
    pub start: f64,
    pub end: f64,
    pub mirrored: bool,
    pub has_indicator: bool,
    pub preset: SanitizedPreset,
}

/// Renderer that records calls instead of running ffmpeg.
#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
    started: AtomicUsize,
    /// When set, each render waits for one permit
    gate: Option<Arc<Semaphore>>,
    /// Clip index that fails with a timeout
    fail_at: Option<u32>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block every render until permits are added to the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            },
            gate,
        )
    }

    pub fn failing_at(index: u32) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of renders started, including ones still waiting on the gate.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClipRenderer for RecordingRenderer {
    async fn render(
        &self,
        request: ClipRequest<'_>,
        graph: FilterGraph,
        preset: &SanitizedPreset,
    ) -> MediaResult<ClipArtifact> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let clip = request.clip;
        self.calls.lock().unwrap().push(RenderCall {
            index: clip.index,
            start: clip.start,
            end: clip.end,
            mirrored: graph.stages().contains(&FilterStage::Mirror),
            has_indicator: graph.indicator().is_some(),
            preset: preset.clone(),
        });

        if self.fail_at == Some(clip.index) {
            return Err(MediaError::Timeout(Duration::from_secs(60)));
        }

        Ok(ClipArtifact {
            index: clip.index,
            path: request.output_path(),
            size_bytes: 1024,
            duration: clip.duration(),
        })
    }
}

/// Sink that holds every publish for a fixed delay.
pub struct SlowSink {
    pub delay: Duration,
}

#[async_trait]
impl StatusSink for SlowSink {
    async fn publish(&self, _event: &StatusEvent) -> WorkerResult<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Orchestrator wired to fakes, plus handles to inspect them.
pub struct Harness<R> {
    pub orchestrator: Orchestrator,
    pub store: Arc<InMemoryJobStore>,
    pub renderer: Arc<R>,
    pub work_dir: tempfile::TempDir,
}

pub fn config(work_dir: &Path) -> WorkerConfig {
    WorkerConfig {
        work_dir: work_dir.to_path_buf(),
        poll_interval: Duration::from_millis(10),
        ..WorkerConfig::default()
    }
}

pub fn harness_with_sink<R: ClipRenderer + 'static>(
    duration: f64,
    renderer: Arc<R>,
    sink: Arc<dyn StatusSink>,
) -> Harness<R> {
    let work_dir = tempfile::tempdir().expect("Failed to create work dir");
    let store = Arc::new(InMemoryJobStore::new(EvictionPolicy::keep_forever()));
    let orchestrator = Orchestrator::new(
        &config(work_dir.path()),
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::new(FakeProbe {
            duration,
            has_audio: true,
        }),
        Arc::clone(&renderer) as Arc<dyn ClipRenderer>,
        sink,
    );
    Harness {
        orchestrator,
        store,
        renderer,
        work_dir,
    }
}

pub fn harness<R: ClipRenderer + 'static>(duration: f64, renderer: Arc<R>) -> Harness<R> {
    harness_with_sink(duration, renderer, Arc::new(TracingSink))
}
