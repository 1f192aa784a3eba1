//! Clip distribution planning.
//!
//! Turns a source duration and the requested clip length/count into an
//! ordered list of [`ClipDefinition`]s. Three modes are supported:
//!
//! - **automatic**: fixed-length contiguous clips, centered in the source,
//!   optionally jittered by up to one second.
//! - **optimal**: `max_clips` equal segments covering the whole source.
//! - **manual**: caller-supplied ranges, invalid ones dropped.
//!
//! No plan ever holds more than [`MAX_PHYSICAL_CLIPS`] clips. In automatic
//! mode the overflow is folded into up to [`MAX_EXTENDED_CLIPS`] longer clips
//! so that requested coverage is kept where the 60 s limit allows.

use rand::Rng;
use sclip_models::{ClipDefinition, CustomClip, DistributionMode, ProcessingOptions};
use tracing::debug;

use crate::error::PlanError;

/// Hard ceiling on clips per job.
pub const MAX_PHYSICAL_CLIPS: usize = 50;
/// Upper bound on any single clip, standard or extended.
pub const MAX_CLIP_DURATION: f64 = 60.0;
/// Upper bound on the requested clip count.
pub const MAX_REQUESTED_CLIPS: u32 = 100;
/// Number of extended clips used to absorb overflow.
pub const MAX_EXTENDED_CLIPS: usize = 2;
/// Maximum jitter applied to an automatic-mode cut point.
pub const MAX_JITTER_SECS: f64 = 1.0;

/// Planner input.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub source_duration: f64,
    pub clip_duration: f64,
    pub max_clips: u32,
    pub mode: DistributionMode,
    pub custom: &'a [CustomClip],
    pub jitter: bool,
}

impl<'a> PlanRequest<'a> {
    pub fn from_options(source_duration: f64, options: &'a ProcessingOptions) -> Self {
        Self {
            source_duration,
            clip_duration: options.clip_duration,
            max_clips: options.max_clips,
            mode: options.mode,
            custom: &options.clips,
            jitter: options.jitter,
        }
    }

    /// Check the range invariants shared by every mode.
    pub fn validate(&self) -> Result<(), PlanError> {
        let cd = self.clip_duration;
        // Written as negated ranges so NaN is rejected too.
        if !(cd > 0.0 && cd <= MAX_CLIP_DURATION) {
            return Err(PlanError::ClipDuration {
                value: cd,
                max: MAX_CLIP_DURATION,
            });
        }
        if self.max_clips == 0 || self.max_clips > MAX_REQUESTED_CLIPS {
            return Err(PlanError::MaxClips {
                value: self.max_clips,
                max: MAX_REQUESTED_CLIPS,
            });
        }
        if !(self.source_duration > 0.0 && self.source_duration.is_finite()) {
            return Err(PlanError::SourceDuration(self.source_duration));
        }
        if cd > self.source_duration {
            return Err(PlanError::ClipLongerThanSource {
                clip_duration: cd,
                source_duration: self.source_duration,
            });
        }
        Ok(())
    }
}

/// An ordered, validated list of clips for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionPlan {
    pub source_duration: f64,
    pub clips: Vec<ClipDefinition>,
}

impl DistributionPlan {
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Sum of clip durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(ClipDefinition::duration).sum()
    }

    /// Share of the source covered by clips, in percent.
    pub fn coverage(&self) -> f64 {
        if self.source_duration <= 0.0 {
            return 0.0;
        }
        self.total_duration() / self.source_duration * 100.0
    }
}

/// Plan clips for a request.
///
/// Fails before producing anything when the request violates a range
/// invariant. `rng` is only consulted for automatic mode with jitter.
pub fn plan<R: Rng>(
    request: &PlanRequest<'_>,
    rng: &mut R,
) -> Result<DistributionPlan, PlanError> {
    request.validate()?;

    let d = request.source_duration;
    let ranges = match request.mode {
        DistributionMode::Automatic => automatic_ranges(
            d,
            request.clip_duration,
            request.max_clips as usize,
            request.jitter,
            rng,
        ),
        DistributionMode::Optimal => {
            optimal_ranges(d, (request.max_clips as usize).min(MAX_PHYSICAL_CLIPS))
        }
        DistributionMode::Manual => {
            let clips = manual_clips(d, request.custom);
            if clips.is_empty() {
                return Err(PlanError::NoValidClips);
            }
            debug!(
                requested = request.custom.len(),
                kept = clips.len(),
                "Manual distribution"
            );
            return Ok(DistributionPlan {
                source_duration: d,
                clips,
            });
        }
    };

    let clips = ranges
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| ClipDefinition::new(i as u32 + 1, start, end))
        .collect::<Vec<_>>();

    debug!(
        mode = %request.mode,
        clips = clips.len(),
        source_duration = d,
        "Planned distribution"
    );

    Ok(DistributionPlan {
        source_duration: d,
        clips,
    })
}

/// Lengths of the clips an automatic plan lays out.
///
/// Up to the ceiling every clip has length `clip_duration`. Above it, the
/// leading clips stay standard and the remaining requested duration is split
/// evenly across the extended clips, each capped at [`MAX_CLIP_DURATION`].
fn automatic_lengths(source_duration: f64, clip_duration: f64, max_clips: usize) -> Vec<f64> {
    let fittable = (source_duration / clip_duration).floor() as usize;
    let actual = max_clips.min(fittable);

    if actual <= MAX_PHYSICAL_CLIPS {
        return vec![clip_duration; actual];
    }

    let standard = MAX_PHYSICAL_CLIPS - MAX_EXTENDED_CLIPS;
    let overflow = (actual - standard) as f64 * clip_duration;
    let extended = (overflow / MAX_EXTENDED_CLIPS as f64).min(MAX_CLIP_DURATION);

    let mut lengths = vec![clip_duration; standard];
    lengths.extend(std::iter::repeat(extended).take(MAX_EXTENDED_CLIPS));
    lengths
}

fn automatic_ranges<R: Rng>(
    source_duration: f64,
    clip_duration: f64,
    max_clips: usize,
    jitter: bool,
    rng: &mut R,
) -> Vec<(f64, f64)> {
    let lengths = automatic_lengths(source_duration, clip_duration, max_clips);
    let span: f64 = lengths.iter().sum();
    let lead = ((source_duration - span) / 2.0).max(0.0);
    // Jitter never exceeds the slack on either side of the centered span.
    let max_offset = MAX_JITTER_SECS.min(lead);

    let mut cursor = lead;
    lengths
        .into_iter()
        .map(|len| {
            let base = cursor;
            cursor += len;

            let start = if jitter && max_offset > 0.0 {
                let offset = rng.random_range(-max_offset..=max_offset);
                (base + offset).clamp(0.0, source_duration - len)
            } else {
                base
            };
            (start, (start + len).min(source_duration))
        })
        .collect()
}

/// Split `[0, source_duration]` into `count` equal segments.
///
/// Returns nothing when either input is not positive.
pub fn optimal_ranges(source_duration: f64, count: usize) -> Vec<(f64, f64)> {
    if !(source_duration > 0.0) || count == 0 {
        return Vec::new();
    }
    let step = source_duration / count as f64;
    (0..count)
        .map(|i| {
            let start = i as f64 * step;
            let end = if i + 1 == count {
                source_duration
            } else {
                ((i + 1) as f64 * step).min(source_duration)
            };
            (start, end)
        })
        .collect()
}

/// Keep the valid caller ranges, in order, up to the ceiling.
fn manual_clips(source_duration: f64, custom: &[CustomClip]) -> Vec<ClipDefinition> {
    custom
        .iter()
        .filter(|c| c.start >= 0.0 && c.end > c.start && c.end <= source_duration)
        .take(MAX_PHYSICAL_CLIPS)
        .enumerate()
        .map(|(i, c)| {
            ClipDefinition::new(i as u32 + 1, c.start, c.end).with_effects(c.effects.clone())
        })
        .collect()
}
