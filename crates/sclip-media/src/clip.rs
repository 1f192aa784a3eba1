//! Clip execution.
//!
//! One ffmpeg invocation per clip: seek to the clip start, apply the compiled
//! filter graph, encode with the sanitized preset and verify the output file.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use sclip_models::{ClipArtifact, ClipDefinition};
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::FilterGraph;
use crate::indicator::write_indicator_png;
use crate::preset::SanitizedPreset;

/// Default wall-clock limit for one clip.
pub const DEFAULT_CLIP_TIMEOUT: Duration = Duration::from_secs(60);

/// Metric names.
pub mod names {
    pub const CLIPS_RENDERED_TOTAL: &str = "sclip_clips_rendered_total";
    pub const CLIPS_FAILED_TOTAL: &str = "sclip_clips_failed_total";
    pub const CLIP_RENDER_SECONDS: &str = "sclip_clip_render_seconds";
}

/// Everything the executor needs to know about one clip besides its graph.
#[derive(Debug, Clone, Copy)]
pub struct ClipRequest<'a> {
    /// Source path or URL
    pub source: &'a str,
    /// Whether the source carries an audio stream
    pub source_has_audio: bool,
    pub clip: &'a ClipDefinition,
    /// Directory receiving `clip_NNN.mp4`
    pub output_dir: &'a Path,
}

impl ClipRequest<'_> {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(self.clip.filename())
    }
}

/// Renders a single clip to a file.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    async fn render(
        &self,
        request: ClipRequest<'_>,
        graph: FilterGraph,
        preset: &SanitizedPreset,
    ) -> MediaResult<ClipArtifact>;
}

/// Executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// ffmpeg program name or path
    pub ffmpeg_program: String,
    /// Per-clip timeout
    pub timeout: Duration,
    /// Encoder threads
    pub threads: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            ffmpeg_program: "ffmpeg".to_string(),
            timeout: DEFAULT_CLIP_TIMEOUT,
            threads: 2,
        }
    }
}

/// [`ClipRenderer`] that shells out to ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegClipExecutor {
    config: ExecutorConfig,
}

impl FfmpegClipExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Build the ffmpeg command for one clip.
    ///
    /// `indicator_png` must be given when the graph has an indicator; it
    /// becomes input 1.
    pub fn build_command(
        &self,
        request: &ClipRequest<'_>,
        graph: FilterGraph,
        preset: &SanitizedPreset,
        indicator_png: Option<&Path>,
    ) -> FfmpegCommand {
        let clip = request.clip;
        let mut cmd = FfmpegCommand::new(request.source, request.output_path())
            .threads(self.config.threads)
            .seek(clip.start)
            .duration(clip.duration());

        if let Some(png) = indicator_png {
            cmd = cmd.overlay_input(png);
        }

        let mut filter = graph.into_filter_complex(preset.video_filter.as_deref(), 1);
        let audio_filter = preset
            .audio_filter
            .as_deref()
            .map(str::trim)
            .filter(|af| !af.is_empty() && request.source_has_audio);

        cmd = match audio_filter {
            Some(af) => {
                filter.push_str(&format!(";[0:a]{}[aout]", af));
                cmd.filter_complex(filter).map("[vout]").map("[aout]")
            }
            None => cmd.filter_complex(filter).map("[vout]").map("0:a?"),
        };

        cmd.output_args(preset.flags.iter().cloned())
    }
}

#[async_trait]
impl ClipRenderer for FfmpegClipExecutor {
    async fn render(
        &self,
        request: ClipRequest<'_>,
        graph: FilterGraph,
        preset: &SanitizedPreset,
    ) -> MediaResult<ClipArtifact> {
        let clip = request.clip;
        let output = request.output_path();
        let started = Instant::now();

        info!(
            clip = clip.index,
            start = clip.start,
            end = clip.end,
            "Rendering clip to {}",
            output.display()
        );

        // Held until ffmpeg exits; the PNG is removed on drop.
        let indicator_png = match graph.indicator() {
            Some(indicator) => {
                let number = indicator.number;
                let settings = indicator.settings.clone();
                let dir = request.output_dir.to_path_buf();
                let file = tokio::task::spawn_blocking(move || {
                    write_indicator_png(number, &settings, &dir)
                })
                .await
                .map_err(|e| MediaError::internal(format!("indicator task failed: {}", e)))??;
                Some(file)
            }
            None => None,
        };

        let cmd = self.build_command(
            &request,
            graph,
            preset,
            indicator_png.as_ref().map(|f| f.path()),
        );

        let runner = FfmpegRunner::new()
            .with_program(self.config.ffmpeg_program.clone())
            .with_timeout(self.config.timeout);

        let index = clip.index;
        let clip_duration = clip.duration();
        let result = runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    clip = index,
                    percent = progress.percentage(clip_duration),
                    "ffmpeg progress"
                );
            })
            .await;
        drop(indicator_png);

        let result = match result {
            Ok(()) => verify_output(&output).await,
            Err(e) => Err(e),
        };

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(size_bytes) => {
                let labels = [("outcome", "ok".to_string())];
                counter!(names::CLIPS_RENDERED_TOTAL, &labels).increment(1);
                histogram!(names::CLIP_RENDER_SECONDS, &labels).record(elapsed);

                info!(
                    clip = index,
                    size_bytes,
                    elapsed_secs = elapsed,
                    "Clip rendered"
                );
                Ok(ClipArtifact {
                    index,
                    path: output,
                    size_bytes,
                    duration: clip_duration,
                })
            }
            Err(e) => {
                let labels = [("kind", e.kind().to_string())];
                counter!(names::CLIPS_FAILED_TOTAL, &labels).increment(1);
                warn!(clip = index, error = %e, "Clip failed");
                Err(e)
            }
        }
    }
}

/// Byte size of a finished clip; a missing or zero-byte file is an error.
async fn verify_output(path: &Path) -> MediaResult<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        _ => Err(MediaError::EmptyOutput(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::compile;
    use crate::preset::sanitize;
    use sclip_models::{FrameSize, IndicatorSettings, ResolvedEffects};

    fn request<'a>(clip: &'a ClipDefinition, dir: &'a Path, audio: bool) -> ClipRequest<'a> {
        ClipRequest {
            source: "/srv/in.mp4",
            source_has_audio: audio,
            clip,
            output_dir: dir,
        }
    }

    fn plain_graph(clip: &ClipDefinition) -> FilterGraph {
        compile(&ResolvedEffects::default(), clip, FrameSize::default()).unwrap()
    }

    #[test]
    fn test_build_command_plain() {
        let clip = ClipDefinition::new(2, 10.0, 15.0);
        let dir = Path::new("/tmp/out");
        let executor = FfmpegClipExecutor::default();
        let preset = sanitize("-c:v libx264 -crf 23").unwrap();

        let args = executor
            .build_command(&request(&clip, dir, true), plain_graph(&clip), &preset, None)
            .build_args();

        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-y",
                "-loglevel",
                "error",
                "-progress",
                "pipe:1",
                "-threads",
                "2",
                "-ss",
                "10.000",
                "-t",
                "5.000",
                "-i",
                "/srv/in.mp4",
                "-filter_complex",
                "[0:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,format=yuv420p[vout]",
                "-map",
                "[vout]",
                "-map",
                "0:a?",
                "-c:v",
                "libx264",
                "-crf",
                "23",
                "/tmp/out/clip_002.mp4",
            ]
        );
    }

    #[test]
    fn test_build_command_with_audio_filter_and_indicator() {
        let clip = ClipDefinition::new(1, 0.0, 5.0);
        let dir = Path::new("/tmp/out");
        let effects = ResolvedEffects {
            indicator: Some(IndicatorSettings::default()),
            ..Default::default()
        };
        let graph = compile(&effects, &clip, FrameSize::default()).unwrap();
        let preset = sanitize("-af volume=2 -crf 20").unwrap();

        let args = FfmpegClipExecutor::default()
            .build_command(
                &request(&clip, dir, true),
                graph,
                &preset,
                Some(Path::new("/tmp/out/ind.png")),
            )
            .build_args();

        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("[1:v]format=rgba[ind]"));
        assert!(filter.ends_with(";[0:a]volume=2[aout]"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[aout]"));
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == "/tmp/out/ind.png"));
    }

    #[test]
    fn test_audio_filter_skipped_without_audio() {
        let clip = ClipDefinition::new(1, 0.0, 5.0);
        let preset = sanitize("-af volume=2").unwrap();
        let args = FfmpegClipExecutor::default()
            .build_command(
                &request(&clip, Path::new("/tmp"), false),
                plain_graph(&clip),
                &preset,
                None,
            )
            .build_args();
        assert!(!args.iter().any(|a| a.contains("[aout]")));
        assert!(args.iter().any(|a| a == "0:a?"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script standing in for ffmpeg.
        fn fake_ffmpeg(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-ffmpeg.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().to_string()
        }

        fn executor(program: String, timeout: Duration) -> FfmpegClipExecutor {
            FfmpegClipExecutor::new(ExecutorConfig {
                ffmpeg_program: program,
                timeout,
                threads: 1,
            })
        }

        async fn run(executor: &FfmpegClipExecutor, dir: &Path) -> MediaResult<ClipArtifact> {
            let clip = ClipDefinition::new(1, 0.0, 5.0);
            let graph = plain_graph(&clip);
            executor
                .render(request(&clip, dir, true), graph, &SanitizedPreset::default())
                .await
        }

        #[tokio::test]
        async fn test_success_reports_size() {
            let dir = tempfile::tempdir().unwrap();
            // The output path is the last argument.
            let program = fake_ffmpeg(
                dir.path(),
                "for last; do :; done\nprintf 'not really a video' > \"$last\"",
            );
            let artifact = run(&executor(program, Duration::from_secs(10)), dir.path())
                .await
                .unwrap();
            assert_eq!(artifact.index, 1);
            assert_eq!(artifact.size_bytes, 18);
            assert!(artifact.path.ends_with("clip_001.mp4"));
        }

        #[tokio::test]
        async fn test_exit_zero_without_output_fails() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "exit 0");
            let err = run(&executor(program, Duration::from_secs(10)), dir.path())
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::EmptyOutput(_)));
        }

        #[tokio::test]
        async fn test_zero_byte_output_fails() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "for last; do :; done\n: > \"$last\"");
            let err = run(&executor(program, Duration::from_secs(10)), dir.path())
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::EmptyOutput(_)));
            assert_eq!(err.kind(), "empty output");
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "echo 'Invalid data found' >&2\nexit 1");
            let err = run(&executor(program, Duration::from_secs(10)), dir.path())
                .await
                .unwrap_err();
            match err {
                MediaError::FfmpegFailed { stderr, exit_code, .. } => {
                    assert_eq!(exit_code, Some(1));
                    assert!(stderr.unwrap().contains("Invalid data found"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "exec sleep 5");
            let started = Instant::now();
            let err = run(&executor(program, Duration::from_millis(300)), dir.path())
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::Timeout(_)));
            assert!(started.elapsed() < Duration::from_secs(4));
        }
    }
}
