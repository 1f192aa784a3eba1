//! Planned clip ranges and generated clip artifacts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::EffectSettings;

/// One planned time-range slice of the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipDefinition {
    /// 1-based, dense index; matches output ordering
    pub index: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Per-clip effect overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<EffectSettings>,
}

impl ClipDefinition {
    pub fn new(index: u32, start: f64, end: f64) -> Self {
        Self {
            index,
            start,
            end,
            effects: None,
        }
    }

    pub fn with_effects(mut self, effects: Option<EffectSettings>) -> Self {
        self.effects = effects;
        self
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Output filename for this clip, e.g. `clip_003.mp4`.
    pub fn filename(&self) -> String {
        format!("clip_{:03}.mp4", self.index)
    }
}

/// A generated clip file, verified to exist and be non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipArtifact {
    pub index: u32,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Duration in seconds
    pub duration: f64,
}

impl ClipArtifact {
    /// Get formatted file size (e.g. "1.25 MB").
    pub fn size_formatted(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if self.size_bytes >= MB {
            format!("{:.2} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.2} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} B", self.size_bytes)
        }
    }
}
