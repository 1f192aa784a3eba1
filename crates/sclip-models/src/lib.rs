//! Shared data models for the story clip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their status and the poll view
//! - Processing options and distribution modes
//! - Effect settings and their per-clip/job-level resolution
//! - Clip definitions and generated artifacts
//! - Encoding configuration
//! - Status events emitted on job transitions

pub mod clip;
pub mod effects;
pub mod encoding;
pub mod error;
pub mod event;
pub mod idempotency;
pub mod job;
pub mod job_status;
pub mod options;

// Re-export common types
pub use clip::{ClipArtifact, ClipDefinition};
pub use effects::{
    resolve_effects, ColorAdjustment, EffectSettings, FlipDirection, IndicatorPosition,
    IndicatorSettings, IndicatorStyle, ResolvedEffects, StylizedOverlay, VisibilityWindow,
};
pub use encoding::{EncodingConfig, FrameSize};
pub use error::{ModelError, ModelResult};
pub use event::{StatusEvent, StatusEventKind};
pub use idempotency::IdempotencyKey;
pub use job::{Job, JobId, JobView};
pub use job_status::JobStatus;
pub use options::{CustomClip, DistributionMode, ProcessingOptions};
