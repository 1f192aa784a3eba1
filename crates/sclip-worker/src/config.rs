//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use sclip_media::{ExecutorConfig, DEFAULT_CLIP_TIMEOUT};
use sclip_models::FrameSize;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for job outputs; each job gets a subdirectory
    pub work_dir: PathBuf,
    /// ffmpeg program name or path
    pub ffmpeg_program: String,
    /// ffprobe program name or path
    pub ffprobe_program: String,
    /// Wall-clock limit for one clip
    pub clip_timeout: Duration,
    /// Encoder threads per clip
    pub ffmpeg_threads: u32,
    /// Output frame size for every clip
    pub frame: FrameSize,
    /// Terminal job records older than this are evicted
    pub eviction_max_age: Duration,
    /// How often the eviction sweeper runs
    pub sweep_interval: Duration,
    /// Status poll interval while waiting for a job
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/sclip"),
            ffmpeg_program: "ffmpeg".to_string(),
            ffprobe_program: "ffprobe".to_string(),
            clip_timeout: DEFAULT_CLIP_TIMEOUT,
            ffmpeg_threads: 2,
            frame: FrameSize::default(),
            eviction_max_age: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(600),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("SCLIP_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ffmpeg_program: std::env::var("SCLIP_FFMPEG").unwrap_or(defaults.ffmpeg_program),
            ffprobe_program: std::env::var("SCLIP_FFPROBE").unwrap_or(defaults.ffprobe_program),
            clip_timeout: Duration::from_secs(
                std::env::var("SCLIP_CLIP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_CLIP_TIMEOUT.as_secs()),
            ),
            ffmpeg_threads: std::env::var("SCLIP_FFMPEG_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|t| *t > 0)
                .unwrap_or(defaults.ffmpeg_threads),
            frame: FrameSize::new(
                std::env::var("SCLIP_FRAME_WIDTH")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|w| *w > 0)
                    .unwrap_or(defaults.frame.width),
                std::env::var("SCLIP_FRAME_HEIGHT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|h| *h > 0)
                    .unwrap_or(defaults.frame.height),
            ),
            eviction_max_age: Duration::from_secs(
                std::env::var("SCLIP_EVICT_AFTER_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 3600),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("SCLIP_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(600),
            ),
            poll_interval: Duration::from_millis(
                std::env::var("SCLIP_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(500),
            ),
        }
    }

    /// Settings for the ffmpeg clip executor.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            ffmpeg_program: self.ffmpeg_program.clone(),
            timeout: self.clip_timeout,
            threads: self.ffmpeg_threads,
        }
    }
}
