//! Processing options supplied with a job submission.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::EffectSettings;

/// Default requested clip duration in seconds.
pub const DEFAULT_CLIP_DURATION: f64 = 5.0;
/// Default requested maximum clip count.
pub const DEFAULT_MAX_CLIPS: u32 = 50;

/// Algorithm used to compute clip time ranges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    /// Fixed-length clips centered in the source
    #[default]
    #[serde(alias = "auto")]
    Automatic,
    /// `max_clips` equal segments covering the whole source
    Optimal,
    /// Caller-supplied time ranges
    Manual,
}

impl DistributionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::Automatic => "automatic",
            DistributionMode::Optimal => "optimal",
            DistributionMode::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A caller-supplied clip range for manual mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomClip {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Per-clip effect overrides
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "filters")]
    pub effects: Option<EffectSettings>,
}

impl CustomClip {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            effects: None,
        }
    }

    pub fn with_effects(mut self, effects: EffectSettings) -> Self {
        self.effects = Some(effects);
        self
    }
}

/// Normalized processing options for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// Distribution mode
    #[serde(default)]
    pub mode: DistributionMode,

    /// Requested clip duration in seconds
    #[serde(default = "default_clip_duration")]
    pub clip_duration: f64,

    /// Requested maximum clip count
    #[serde(default = "default_max_clips")]
    pub max_clips: u32,

    /// Perturb automatic-mode cut points by up to one second
    #[serde(default, alias = "randomOffset")]
    pub jitter: bool,

    /// Explicit ranges for manual mode
    #[serde(default, alias = "customTimestamps")]
    pub clips: Vec<CustomClip>,

    /// Job-level effect settings
    #[serde(default, alias = "filters")]
    pub effects: EffectSettings,

    /// Older callers send job-level effects under `visual`; lowest precedence.
    #[serde(default, rename = "visual", skip_serializing_if = "Option::is_none")]
    pub legacy_visual: Option<EffectSettings>,

    /// Encoder preset: a catalog name or a free-form flag string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

fn default_clip_duration() -> f64 {
    DEFAULT_CLIP_DURATION
}
fn default_max_clips() -> u32 {
    DEFAULT_MAX_CLIPS
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            mode: DistributionMode::default(),
            clip_duration: DEFAULT_CLIP_DURATION,
            max_clips: DEFAULT_MAX_CLIPS,
            jitter: false,
            clips: Vec::new(),
            effects: EffectSettings::default(),
            legacy_visual: None,
            preset: None,
        }
    }
}

impl ProcessingOptions {
    /// Automatic distribution with the given clip length and count.
    pub fn automatic(clip_duration: f64, max_clips: u32) -> Self {
        Self {
            mode: DistributionMode::Automatic,
            clip_duration,
            max_clips,
            ..Default::default()
        }
    }

    /// Optimal distribution into `max_clips` equal segments.
    pub fn optimal(max_clips: u32) -> Self {
        Self {
            mode: DistributionMode::Optimal,
            max_clips,
            ..Default::default()
        }
    }

    /// Manual distribution over explicit ranges.
    pub fn manual(clips: Vec<CustomClip>) -> Self {
        Self {
            mode: DistributionMode::Manual,
            clips,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_effects(mut self, effects: EffectSettings) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }
}
