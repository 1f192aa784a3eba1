//! Effect settings and their resolution across sources.
//!
//! Effects can be supplied at three levels. For every effect kind the first
//! source that sets it wins, in this order:
//!
//! 1. per-clip settings (manual-mode clip entries)
//! 2. job-level settings (`effects`)
//! 3. legacy job-level settings (`visual`)
//!
//! A kind that no source sets is left unset; the filter compiler omits its
//! stage entirely instead of emitting an identity filter.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A partial record of visual effects. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EffectSettings {
    /// Horizontal mirror
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "mirrorHorizontal",
        alias = "horizontalFlip",
        alias = "flipHorizontal"
    )]
    pub mirror: Option<bool>,

    /// Vertical flip
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "verticalFlip")]
    pub flip_vertical: Option<bool>,

    /// Legacy flip direction, feeding both the mirror and vertical flip kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip: Option<FlipDirection>,

    /// Rotation in degrees; anything but 0, 90, 180 or 270 means none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<i32>,

    /// Center zoom factor, 1.0 to 2.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,

    /// Color adjustment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorAdjustment>,

    /// Named stylized overlay from the fixed catalog
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "overlay")]
    pub stylized: Option<StylizedOverlay>,

    /// Clip-number indicator overlay
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "clipIndicator")]
    pub indicator: Option<IndicatorSettings>,
}

impl EffectSettings {
    /// Check whether no effect kind is set.
    pub fn is_empty(&self) -> bool {
        self.mirror.is_none()
            && self.flip_vertical.is_none()
            && self.flip.is_none()
            && self.rotate.is_none()
            && self.zoom.is_none()
            && self.color.is_none()
            && self.stylized.is_none()
            && self.indicator.is_none()
    }

    pub fn mirrored(mirror: bool) -> Self {
        Self {
            mirror: Some(mirror),
            ..Default::default()
        }
    }

    pub fn with_flip(mut self, flip: FlipDirection) -> Self {
        self.flip = Some(flip);
        self
    }

    pub fn with_rotate(mut self, degrees: i32) -> Self {
        self.rotate = Some(degrees);
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn with_color(mut self, color: ColorAdjustment) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_stylized(mut self, stylized: StylizedOverlay) -> Self {
        self.stylized = Some(stylized);
        self
    }

    pub fn with_indicator(mut self, indicator: IndicatorSettings) -> Self {
        self.indicator = Some(indicator);
        self
    }

    fn horizontal_flip(&self) -> Option<bool> {
        self.mirror
            .or_else(|| self.flip.map(FlipDirection::horizontal))
    }

    fn vertical_flip(&self) -> Option<bool> {
        self.flip_vertical
            .or_else(|| self.flip.map(FlipDirection::vertical))
    }
}

/// Legacy `flip` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlipDirection {
    None,
    Horizontal,
    Vertical,
    Both,
}

impl FlipDirection {
    pub fn horizontal(self) -> bool {
        matches!(self, FlipDirection::Horizontal | FlipDirection::Both)
    }

    pub fn vertical(self) -> bool {
        matches!(self, FlipDirection::Vertical | FlipDirection::Both)
    }
}

/// Color and detail adjustment: either a precomputed formula or numeric
/// parameters.
///
/// When `formula` is present it is used verbatim and the numeric fields are
/// ignored. Numeric values are clamped to their documented ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColorAdjustment {
    /// Precomputed filter expression, inserted as one opaque stage
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "ffmpegCommand")]
    pub formula: Option<String>,
    /// Brightness, -1.0 to 1.0 (0 = unchanged)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    /// Contrast, 0.0 to 3.0 (1 = unchanged)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    /// Saturation, 0.0 to 3.0 (1 = unchanged)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    /// Hue rotation in degrees, -180 to 180
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    /// Color temperature shift, -100 (cool) to 100 (warm)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Exposure in stops, -2.0 to 2.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,
    /// Gaussian blur sigma, 0 to 20 (0 = none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<f64>,
    /// Unsharp amount, 0 to 5 (0 = none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpen: Option<f64>,
}

impl ColorAdjustment {
    pub fn formula(formula: impl Into<String>) -> Self {
        Self {
            formula: Some(formula.into()),
            ..Default::default()
        }
    }

    pub fn eq(brightness: Option<f64>, contrast: Option<f64>, saturation: Option<f64>) -> Self {
        Self {
            formula: None,
            brightness,
            contrast,
            saturation,
            ..Default::default()
        }
    }
}

/// Stylized overlay selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StylizedOverlay {
    /// Catalog name (e.g. "vignette", "vhs")
    #[serde(rename = "type", alias = "name")]
    pub name: String,
    /// Intensity in [0, 1]; defaults to 0.5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

impl StylizedOverlay {
    pub fn new(name: impl Into<String>, intensity: f64) -> Self {
        Self {
            name: name.into(),
            intensity: Some(intensity),
        }
    }
}

/// Corner where the indicator is composited.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorPosition {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Indicator badge shape.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStyle {
    /// Number only, no background
    Simple,
    /// Number on a filled rectangle
    #[default]
    Badge,
    /// Number on a filled circle
    Rounded,
}

/// Time window, relative to clip start, during which the indicator shows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisibilityWindow {
    /// Seconds from clip start
    #[serde(default)]
    pub start: f64,
    /// Visible duration in seconds
    pub duration: f64,
}

/// Clip-number indicator overlay descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSettings {
    #[serde(default)]
    pub position: IndicatorPosition,
    /// Base size in pixels
    #[serde(default = "default_indicator_size")]
    pub size: u32,
    /// Background color as `#rrggbb`
    #[serde(default = "default_bg_color")]
    pub bg_color: String,
    /// Text color as `#rrggbb`
    #[serde(default = "default_text_color")]
    pub text_color: String,
    /// Background opacity in [0, 1]
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub style: IndicatorStyle,
    /// When absent the indicator is visible for the whole clip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<VisibilityWindow>,
}

fn default_indicator_size() -> u32 {
    90
}
fn default_bg_color() -> String {
    "#000000".to_string()
}
fn default_text_color() -> String {
    "#ffffff".to_string()
}
fn default_opacity() -> f64 {
    0.7
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            position: IndicatorPosition::default(),
            size: default_indicator_size(),
            bg_color: default_bg_color(),
            text_color: default_text_color(),
            opacity: default_opacity(),
            style: IndicatorStyle::default(),
            window: None,
        }
    }
}

/// Effects after precedence has been applied. Unset kinds stay `None`/`false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedEffects {
    pub mirror: bool,
    pub flip_vertical: bool,
    /// Raw requested rotation; the compiler ignores unsupported angles
    pub rotate: Option<i32>,
    pub zoom: Option<f64>,
    pub color: Option<ColorAdjustment>,
    pub stylized: Option<StylizedOverlay>,
    pub indicator: Option<IndicatorSettings>,
}

/// Merge the three effect sources, kind by kind.
///
/// Precedence: `per_clip`, then `job`, then `legacy`. A per-clip value wins
/// even when it disables an effect the job level enables.
pub fn resolve_effects(
    per_clip: Option<&EffectSettings>,
    job: Option<&EffectSettings>,
    legacy: Option<&EffectSettings>,
) -> ResolvedEffects {
    let tiers = [per_clip, job, legacy];

    fn first<T>(
        tiers: &[Option<&EffectSettings>; 3],
        field: impl Fn(&EffectSettings) -> Option<T>,
    ) -> Option<T> {
        tiers.iter().flatten().find_map(|e| field(e))
    }

    ResolvedEffects {
        mirror: first(&tiers, EffectSettings::horizontal_flip).unwrap_or(false),
        flip_vertical: first(&tiers, EffectSettings::vertical_flip).unwrap_or(false),
        rotate: first(&tiers, |e| e.rotate),
        zoom: first(&tiers, |e| e.zoom),
        color: first(&tiers, |e| e.color.clone()),
        stylized: first(&tiers, |e| e.stylized.clone()),
        indicator: first(&tiers, |e| e.indicator.clone()),
    }
}
