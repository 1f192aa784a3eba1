#![deny(unreachable_patterns)]
//! FFmpeg-side building blocks for story clip jobs.
//!
//! This crate provides:
//! - Clip distribution planning over a source duration
//! - Filter graph compilation from resolved effects
//! - Preset sanitization into safe output flags
//! - Type-safe FFmpeg command building with progress and timeouts
//! - Sequential per-clip execution with output verification

pub mod clip;
pub mod command;
pub mod distribution;
pub mod error;
pub mod filters;
pub mod indicator;
pub mod preset;
pub mod probe;
pub mod progress;

pub use clip::{ClipRenderer, ClipRequest, ExecutorConfig, FfmpegClipExecutor, DEFAULT_CLIP_TIMEOUT};
pub use command::{check_program, FfmpegCommand, FfmpegRunner};
pub use distribution::{plan, DistributionPlan, PlanRequest};
pub use error::{FilterError, MediaError, MediaResult, PlanError, SanitizeError};
pub use filters::{compile, FilterGraph, FilterStage, IndicatorOverlay};
pub use indicator::{render_indicator, write_indicator_png};
pub use preset::{sanitize, PresetCatalog, SanitizedPreset};
pub use probe::{FfprobeProbe, SourceProbe, VideoInfo};
pub use progress::{FfmpegProgress, ProgressParser};
