//! Per-clip filter graph compilation.
//!
//! Stage order is fixed:
//!
//! 1. scale-to-fill + center crop to the target frame
//! 2. geometry: center zoom, rotation, mirror, vertical flip
//! 3. color adjustment (opaque formula, or clamped `eq`/`hue`/detail filters)
//! 4. stylized overlay from the catalog
//! 5. clip-number indicator (composited from a rendered PNG)
//! 6. pixel format normalization
//!
//! Stages 2-5 are emitted only when their effect is set. Every stage after
//! the first leaves the frame at the compiled size.

use sclip_models::{
    ClipDefinition, ColorAdjustment, FrameSize, IndicatorPosition, IndicatorSettings,
    ResolvedEffects, StylizedOverlay,
};
use tracing::{debug, warn};

use crate::error::FilterError;

/// Intensity used when a stylized overlay omits it.
pub const DEFAULT_INTENSITY: f64 = 0.5;
/// Distance between the indicator and the frame edges, in pixels.
pub const OVERLAY_MARGIN: u32 = 20;
/// Output pixel format.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Names accepted by the stylized overlay catalog.
pub const STYLIZED_CATALOG: &[&str] = &[
    "vignette",
    "film-grain",
    "grain",
    "vhs",
    "chromatic",
    "chromatic-aberration",
    "light-leak",
    "bokeh",
    "glitch",
    "particles",
    "sparkles",
    "rain",
    "matrix",
    "dna",
    "hexagon",
    "wave",
];

const BRIGHTNESS_RANGE: (f64, f64) = (-1.0, 1.0);
const CONTRAST_RANGE: (f64, f64) = (0.0, 3.0);
const SATURATION_RANGE: (f64, f64) = (0.0, 3.0);
const HUE_RANGE: (f64, f64) = (-180.0, 180.0);
const TEMPERATURE_RANGE: (f64, f64) = (-100.0, 100.0);
const EXPOSURE_RANGE: (f64, f64) = (-2.0, 2.0);
const BLUR_RANGE: (f64, f64) = (0.0, 20.0);
const SHARPEN_RANGE: (f64, f64) = (0.0, 5.0);
const ZOOM_RANGE: (f64, f64) = (1.0, 2.0);
/// Mid-tone color balance shift at full temperature.
const TEMPERATURE_SHIFT: f64 = 0.3;

/// Filters a color formula may not start with; they change the frame size.
const GEOMETRY_FILTERS: &[&str] = &[
    "scale", "zscale", "scale2ref", "crop", "pad", "transpose", "rotate", "zoompan", "tile",
    "hstack", "vstack", "xstack", "tpad",
];

/// One compiled filter stage.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStage {
    ScaleCrop { width: u32, height: u32 },
    /// Center zoom by `factor`, cropped back to the frame
    Zoom { factor: f64, width: u32, height: u32 },
    /// Clockwise rotation by quarter turns (1, 2 or 3)
    Rotate { quarter_turns: u8, width: u32, height: u32 },
    Mirror,
    VerticalFlip,
    /// Rendered color expression (formula verbatim, or `eq=...`)
    Color(String),
    Stylized { name: String, chain: Vec<String> },
    PixelFormat(&'static str),
}

impl FilterStage {
    pub fn render(&self) -> String {
        match self {
            FilterStage::ScaleCrop { width, height } => format!(
                "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
                w = width,
                h = height
            ),
            FilterStage::Zoom {
                factor,
                width,
                height,
            } => format!(
                "scale={}:{}:flags=bicubic,crop={}:{}",
                even(*width as f64 * factor),
                even(*height as f64 * factor),
                width,
                height
            ),
            FilterStage::Rotate {
                quarter_turns: 2, ..
            } => "hflip,vflip".to_string(),
            FilterStage::Rotate {
                quarter_turns,
                width,
                height,
            } => format!(
                "transpose={},scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
                if *quarter_turns == 3 { "cclock" } else { "clock" },
                w = width,
                h = height
            ),
            FilterStage::Mirror => "hflip".to_string(),
            FilterStage::VerticalFlip => "vflip".to_string(),
            FilterStage::Color(expr) => expr.clone(),
            FilterStage::Stylized { chain, .. } => chain.join(","),
            FilterStage::PixelFormat(fmt) => format!("format={}", fmt),
        }
    }
}

/// Indicator overlay descriptor; the raster is rendered by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOverlay {
    /// Number drawn on the badge (the clip index)
    pub number: u32,
    pub settings: IndicatorSettings,
    /// Visible interval in clip-relative seconds; `None` = whole clip
    pub window: Option<(f64, f64)>,
}

impl IndicatorOverlay {
    /// `x:y` overlay coordinates for the configured corner.
    pub fn position_expr(&self) -> String {
        let m = OVERLAY_MARGIN;
        match self.settings.position {
            IndicatorPosition::TopLeft => format!("{m}:{m}"),
            IndicatorPosition::TopRight => format!("W-w-{m}:{m}"),
            IndicatorPosition::BottomLeft => format!("{m}:H-h-{m}"),
            IndicatorPosition::BottomRight => format!("W-w-{m}:H-h-{m}"),
        }
    }

    /// Overlay filter body, without pads.
    pub fn overlay_expr(&self) -> String {
        let mut expr = format!("overlay={}:format=auto", self.position_expr());
        if let Some((start, end)) = self.window {
            expr.push_str(&format!(":enable='between(t,{},{})'", num(start), num(end)));
        }
        expr
    }
}

/// Compiled, immutable filter graph for one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    stages: Vec<FilterStage>,
    indicator: Option<IndicatorOverlay>,
}

impl FilterGraph {
    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn indicator(&self) -> Option<&IndicatorOverlay> {
        self.indicator.as_ref()
    }

    /// Comma-joined chain of every stage, ignoring the indicator.
    pub fn chain(&self) -> String {
        self.stages
            .iter()
            .map(FilterStage::render)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Build the video part of `-filter_complex`, ending in `[vout]`.
    ///
    /// `pre_filter` (a preset's extracted video filter) runs first, before the
    /// mandatory scale/crop, so the frame size is always the compiled one.
    /// `overlay_input` is the ffmpeg input index of the indicator PNG.
    pub fn into_filter_complex(self, pre_filter: Option<&str>, overlay_input: usize) -> String {
        let mut head: Vec<String> = Vec::with_capacity(self.stages.len() + 1);
        if let Some(pre) = pre_filter.map(str::trim).filter(|p| !p.is_empty()) {
            head.push(pre.to_string());
        }

        let (format_stage, body): (Vec<_>, Vec<_>) = self
            .stages
            .iter()
            .partition(|s| matches!(s, FilterStage::PixelFormat(_)));
        head.extend(body.iter().map(|s| s.render()));
        let tail = format_stage
            .iter()
            .map(|s| s.render())
            .collect::<Vec<_>>()
            .join(",");

        match self.indicator {
            None => {
                if !tail.is_empty() {
                    head.push(tail);
                }
                format!("[0:v]{}[vout]", head.join(","))
            }
            Some(indicator) => {
                let mut composite = indicator.overlay_expr();
                if !tail.is_empty() {
                    composite = format!("{},{}", composite, tail);
                }
                format!(
                    "[0:v]{}[base];[{}:v]format=rgba[ind];[base][ind]{}[vout]",
                    head.join(","),
                    overlay_input,
                    composite
                )
            }
        }
    }
}

/// Compile the filter graph for one clip.
///
/// Returns an error only for a color formula that could escape its stage
/// or an indicator color that is not `#rrggbb`.
pub fn compile(
    effects: &ResolvedEffects,
    clip: &ClipDefinition,
    frame: FrameSize,
) -> Result<FilterGraph, FilterError> {
    let mut stages = vec![FilterStage::ScaleCrop {
        width: frame.width,
        height: frame.height,
    }];

    if let Some(factor) = effects
        .zoom
        .filter(|z| z.is_finite())
        .map(|z| z.clamp(ZOOM_RANGE.0, ZOOM_RANGE.1))
        .filter(|z| *z > 1.0)
    {
        stages.push(FilterStage::Zoom {
            factor,
            width: frame.width,
            height: frame.height,
        });
    }

    if let Some(quarter_turns) = effects.rotate.and_then(quarter_turns) {
        stages.push(FilterStage::Rotate {
            quarter_turns,
            width: frame.width,
            height: frame.height,
        });
    }

    if effects.mirror {
        stages.push(FilterStage::Mirror);
    }
    if effects.flip_vertical {
        stages.push(FilterStage::VerticalFlip);
    }

    if let Some(ref color) = effects.color {
        if let Some(expr) = color_stage(color)? {
            stages.push(FilterStage::Color(expr));
        }
    }

    if let Some(ref stylized) = effects.stylized {
        if let Some(stage) = stylized_stage(stylized, frame) {
            stages.push(stage);
        }
    }

    let indicator = match effects.indicator {
        Some(ref settings) => indicator_overlay(settings, clip)?,
        None => None,
    };

    stages.push(FilterStage::PixelFormat(PIXEL_FORMAT));

    debug!(
        clip = clip.index,
        stages = stages.len(),
        indicator = indicator.is_some(),
        "Compiled filter graph"
    );

    Ok(FilterGraph { stages, indicator })
}

/// Validate an opaque filter expression for use inside one chain.
///
/// Graph separators and pad labels would let the text escape its position,
/// and an odd number of quotes would swallow what follows it.
pub fn check_opaque_filter(expr: &str) -> Result<(), char> {
    if let Some(found) = expr
        .chars()
        .find(|c| matches!(c, ';' | '[' | ']') || c.is_control())
    {
        return Err(found);
    }
    if expr.chars().filter(|&c| c == '\'').count() % 2 == 1 {
        return Err('\'');
    }
    Ok(())
}

/// Validate a color formula: one filter that keeps the frame size.
fn check_formula(formula: &str) -> Result<(), FilterError> {
    check_opaque_filter(formula).map_err(|found| FilterError::UnsafeFormula { found })?;

    // Outside quotes a comma starts the next filter of the chain.
    let mut quoted = false;
    for c in formula.chars() {
        match c {
            '\'' => quoted = !quoted,
            ',' | '\\' if !quoted => return Err(FilterError::UnsafeFormula { found: c }),
            _ => {}
        }
    }

    let name = formula
        .split(['=', '@'])
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if GEOMETRY_FILTERS.contains(&name.as_str()) {
        return Err(FilterError::GeometryFormula(name));
    }
    Ok(())
}

/// Map a rotation in degrees to clockwise quarter turns; 0 and unsupported
/// angles mean no rotation.
fn quarter_turns(degrees: i32) -> Option<u8> {
    match degrees.rem_euclid(360) {
        90 => Some(1),
        180 => Some(2),
        270 => Some(3),
        0 => None,
        other => {
            warn!(degrees = other, "Unsupported rotation, skipping");
            None
        }
    }
}

fn color_stage(color: &ColorAdjustment) -> Result<Option<String>, FilterError> {
    if let Some(ref formula) = color.formula {
        let formula = formula.trim();
        if formula.is_empty() {
            return Err(FilterError::EmptyFormula);
        }
        check_formula(formula)?;
        return Ok(Some(formula.to_string()));
    }

    let clamped = |value: Option<f64>, (lo, hi): (f64, f64)| {
        value.filter(|v| v.is_finite()).map(|v| v.clamp(lo, hi))
    };
    let mut filters = Vec::new();

    let params: Vec<String> = [
        ("brightness", color.brightness, BRIGHTNESS_RANGE),
        ("contrast", color.contrast, CONTRAST_RANGE),
        ("saturation", color.saturation, SATURATION_RANGE),
    ]
    .into_iter()
    .filter_map(|(key, value, (lo, hi))| {
        value
            .filter(|v| v.is_finite())
            .map(|v| format!("{}={}", key, num(v.clamp(lo, hi))))
    })
    .collect();
    if !params.is_empty() {
        filters.push(format!("eq={}", params.join(":")));
    }

    if let Some(hue) = clamped(color.hue, HUE_RANGE) {
        filters.push(format!("hue=h={}", num(hue)));
    }
    if let Some(temperature) = clamped(color.temperature, TEMPERATURE_RANGE) {
        let shift = temperature / 100.0 * TEMPERATURE_SHIFT;
        filters.push(format!("colorbalance=rm={}:bm={}", num(shift), num(-shift)));
    }
    if let Some(exposure) = clamped(color.exposure, EXPOSURE_RANGE) {
        filters.push(format!("exposure=exposure={}", num(exposure)));
    }
    if let Some(sigma) = clamped(color.blur, BLUR_RANGE).filter(|v| *v > 0.0) {
        filters.push(format!("gblur=sigma={}", num(sigma)));
    }
    if let Some(amount) = clamped(color.sharpen, SHARPEN_RANGE).filter(|v| *v > 0.0) {
        filters.push(format!("unsharp=5:5:{}", num(amount)));
    }

    if filters.is_empty() {
        return Ok(None);
    }
    Ok(Some(filters.join(",")))
}

fn stylized_stage(overlay: &StylizedOverlay, frame: FrameSize) -> Option<FilterStage> {
    let name = overlay.name.trim().to_ascii_lowercase();
    let i = overlay
        .intensity
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_INTENSITY)
        .clamp(0.0, 1.0);

    let chain: Vec<String> = match name.as_str() {
        "none" | "" => return None,
        "vignette" => vec![format!("vignette=angle={}", num(0.3 + 0.6 * i))],
        "film-grain" | "grain" => vec![noise(10.0 + 40.0 * i, "t+u")],
        "vhs" => vec![
            noise(15.0 + 25.0 * i, "t+u"),
            "eq=contrast=1.1:saturation=0.9:gamma=1.1".to_string(),
        ],
        "chromatic" | "chromatic-aberration" => {
            let s = num(0.02 * i);
            vec![format!(
                "colorchannelmixer=rr=1:rg=0:rb=0:gr={s}:gg=1:gb={s}:br=0:bg={s}:bb=1"
            )]
        }
        "light-leak" => vec![format!(
            "curves=all='0/0 0.3/{} 0.7/{} 1/1'",
            num(0.1 + 0.3 * i),
            num(0.7 + 0.2 * i)
        )],
        "bokeh" => vec![format!("gblur=sigma={}:steps=2", num(5.0 + 15.0 * i))],
        "glitch" => {
            let shift = 0.05 + 0.15 * i;
            vec![
                noise(20.0 + 30.0 * i, "t+u"),
                format!(
                    "colorchannelmixer=rr={}:rg={s}:rb=0:gr={s}:gg={}:gb={s}:br=0:bg={s}:bb={}",
                    num(1.0 + shift),
                    num(1.0 - shift),
                    num(1.0 + shift),
                    s = num(shift)
                ),
                format!(
                    "eq=saturation={}:contrast={}",
                    num(1.2 + 0.3 * i),
                    num(1.1 + 0.2 * i)
                ),
            ]
        }
        "particles" => vec![
            noise(15.0 + 20.0 * i, "t"),
            format!("gblur=sigma={}:steps=1", num(2.0 + 3.0 * i)),
            format!(
                "eq=brightness={}:contrast={}",
                num(0.05 * i),
                num(1.0 + 0.15 * i)
            ),
        ],
        "sparkles" => vec![
            noise(25.0 + 25.0 * i, "t+u"),
            format!(
                "curves=all='0/0 0.7/{} 0.85/{} 1/1'",
                num(0.7 - 0.2 * i),
                num(0.85 + 0.1 * i)
            ),
            format!(
                "eq=brightness={}:saturation={}",
                num(0.08 * i),
                num(1.1 + 0.4 * i)
            ),
        ],
        "rain" => vec![
            noise(10.0 + 20.0 * i, "t"),
            format!("avgblur=sizeX=1:sizeY={}", (5.0 + 10.0 * i).floor() as u32),
            format!(
                "eq=brightness={}:contrast={}",
                num(-0.05 * i),
                num(1.0 + 0.1 * i)
            ),
        ],
        "matrix" => vec![
            noise(20.0 + 25.0 * i, "t"),
            format!(
                "colorchannelmixer=rr=0:rg=0:rb=0:gr={}:gg={}:gb=0:br=0:bg={}:bb=0",
                num(0.3 + 0.4 * i),
                num(0.8 + 0.2 * i),
                num(0.2 + 0.3 * i)
            ),
            format!(
                "eq=contrast={}:brightness={}",
                num(1.2 + 0.3 * i),
                num(0.05 * i)
            ),
        ],
        "dna" => {
            let shift = 0.1 + 0.3 * i;
            vec![
                format!(
                    "colorchannelmixer=rr={}:rg=0:rb={s}:gr=0:gg={}:gb={s}:br={s}:bg={s}:bb={}",
                    num(1.0 + shift),
                    num(1.0 - shift * 0.5),
                    num(1.0 + shift),
                    s = num(shift)
                ),
                format!(
                    "curves=all='0/0 0.25/{} 0.75/{} 1/1'",
                    num(0.25 + 0.1 * i),
                    num(0.75 - 0.1 * i)
                ),
                format!("eq=saturation={}", num(1.3 + 0.5 * i)),
            ]
        }
        "hexagon" => {
            let cell = (20.0 - 12.0 * i).floor().max(2.0) as u32;
            vec![
                format!("scale=iw/{c}:ih/{c}:flags=neighbor", c = cell),
                // Back to the exact frame so later stages see the compiled size
                format!(
                    "scale={}:{}:flags=neighbor",
                    frame.width, frame.height
                ),
                format!("edgedetect=mode=colormix:high={}", num(0.1 + 0.2 * i)),
                format!(
                    "colorchannelmixer=rr=0:rg={}:rb={}",
                    num(0.5 + 0.3 * i),
                    num(0.8 + 0.2 * i)
                ),
            ]
        }
        "wave" => vec![
            format!(
                "curves=all='0/{} 0.25/{} 0.5/0.5 0.75/{} 1/{}'",
                num(0.05 * i),
                num(0.25 + 0.1 * i),
                num(0.75 - 0.1 * i),
                num(1.0 - 0.05 * i)
            ),
            format!(
                "colorchannelmixer=rr={}:rg={}:rb={}",
                num(1.0 - 0.2 * i),
                num(1.0 - 0.1 * i),
                num(1.0 + 0.3 * i)
            ),
            format!("gblur=sigma={}:steps=1", num(1.0 + 2.0 * i)),
        ],
        other => {
            warn!(overlay = other, "Unknown stylized overlay, skipping");
            return None;
        }
    };

    Some(FilterStage::Stylized { name, chain })
}

fn indicator_overlay(
    settings: &IndicatorSettings,
    clip: &ClipDefinition,
) -> Result<Option<IndicatorOverlay>, FilterError> {
    parse_hex_color(&settings.bg_color)?;
    parse_hex_color(&settings.text_color)?;

    let clip_len = clip.duration();
    let window = match settings.window {
        None => None,
        Some(w) => {
            if !(w.start.is_finite() && w.duration.is_finite()) {
                return Ok(None);
            }
            let start = w.start.clamp(0.0, clip_len);
            let end = (start + w.duration.max(0.0)).min(clip_len);
            if end <= start {
                // Never visible inside this clip
                return Ok(None);
            }
            Some((start, end))
        }
    };

    let mut settings = settings.clone();
    settings.opacity = if settings.opacity.is_finite() {
        settings.opacity.clamp(0.0, 1.0)
    } else {
        1.0
    };
    settings.size = settings.size.clamp(16, 512);

    Ok(Some(IndicatorOverlay {
        number: clip.index,
        settings,
        window,
    }))
}

/// Parse `#rrggbb` into RGB components.
pub fn parse_hex_color(value: &str) -> Result<[u8; 3], FilterError> {
    let invalid = || FilterError::InvalidColor(value.to_string());
    let hex = value.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Round to the nearest even pixel count.
fn even(value: f64) -> u32 {
    ((value / 2.0).round() as u32) * 2
}

fn noise(strength: f64, flags: &str) -> String {
    format!("noise=alls={}:allf={}", strength.floor() as u32, flags)
}

/// Format a number with at most three decimals and no trailing zeros.
fn num(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sclip_models::{resolve_effects, EffectSettings, VisibilityWindow};

    fn clip() -> ClipDefinition {
        ClipDefinition::new(3, 10.0, 20.0)
    }

    fn compile_effects(effects: ResolvedEffects) -> FilterGraph {
        compile(&effects, &clip(), FrameSize::default()).unwrap()
    }

    #[test]
    fn test_bare_graph() {
        let graph = compile_effects(ResolvedEffects::default());
        assert_eq!(
            graph.chain(),
            "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,format=yuv420p"
        );
        assert!(graph.indicator().is_none());
    }

    #[test]
    fn test_stage_order() {
        let graph = compile_effects(ResolvedEffects {
            mirror: true,
            color: Some(ColorAdjustment::eq(Some(0.1), None, Some(1.4))),
            stylized: Some(StylizedOverlay::new("grain", 0.5)),
            ..Default::default()
        });
        assert_eq!(
            graph.chain(),
            "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,\
             hflip,eq=brightness=0.1:saturation=1.4,noise=alls=30:allf=t+u,format=yuv420p"
        );
    }

    #[test]
    fn test_per_clip_mirror_compiles_hflip() {
        let clip_fx = EffectSettings::mirrored(true);
        let job_fx = EffectSettings::mirrored(false);
        let graph = compile_effects(resolve_effects(Some(&clip_fx), Some(&job_fx), None));
        assert!(graph.stages().contains(&FilterStage::Mirror));
    }

    #[test]
    fn test_color_values_clamped() {
        let graph = compile_effects(ResolvedEffects {
            color: Some(ColorAdjustment::eq(Some(-4.0), Some(9.0), Some(-1.0))),
            ..Default::default()
        });
        assert!(graph
            .chain()
            .contains("eq=brightness=-1:contrast=3:saturation=0"));
    }

    #[test]
    fn test_empty_color_is_omitted() {
        let graph = compile_effects(ResolvedEffects {
            color: Some(ColorAdjustment::default()),
            ..Default::default()
        });
        assert_eq!(graph.stages().len(), 2);
    }

    #[test]
    fn test_formula_is_opaque() {
        let graph = compile_effects(ResolvedEffects {
            color: Some(ColorAdjustment {
                formula: Some("eq=brightness=0.05:saturation=1.2".into()),
                brightness: Some(0.9),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(
            graph.stages()[1],
            FilterStage::Color("eq=brightness=0.05:saturation=1.2".into())
        );
    }

    #[test]
    fn test_formula_breakout_rejected() {
        for formula in [
            "eq=brightness=0.1[x];[x]drawtext=text=pwned",
            "eq=gamma=1.1;movie=/etc/passwd",
            "eq=gamma=1\n-i",
            "curves=all='0/0",
        ] {
            let effects = ResolvedEffects {
                color: Some(ColorAdjustment::formula(formula)),
                ..Default::default()
            };
            assert!(
                compile(&effects, &clip(), FrameSize::default()).is_err(),
                "{formula} accepted"
            );
        }
    }

    #[test]
    fn test_formula_must_keep_frame_size() {
        for (formula, expected) in [
            (
                "eq=gamma=1.1,scale=10:10",
                FilterError::UnsafeFormula { found: ',' },
            ),
            ("eq=gamma=1.1\\,scale=10:10", FilterError::UnsafeFormula { found: '\\' }),
            ("scale=10:10", FilterError::GeometryFormula("scale".into())),
            ("crop@c=100:100", FilterError::GeometryFormula("crop".into())),
            ("  Pad=2000:2000", FilterError::GeometryFormula("pad".into())),
        ] {
            let effects = ResolvedEffects {
                color: Some(ColorAdjustment::formula(formula)),
                ..Default::default()
            };
            assert_eq!(
                compile(&effects, &clip(), FrameSize::default()),
                Err(expected),
                "{formula}"
            );
        }
    }

    #[test]
    fn test_formula_quoted_commas_allowed() {
        let formula = "eq=brightness='if(between(t,1,2),0.1,0)':eval=frame";
        let graph = compile_effects(ResolvedEffects {
            color: Some(ColorAdjustment::formula(formula)),
            ..Default::default()
        });
        assert_eq!(graph.stages()[1], FilterStage::Color(formula.into()));
    }

    #[test]
    fn test_extended_adjustments_clamped_in_order() {
        let graph = compile_effects(ResolvedEffects {
            color: Some(ColorAdjustment {
                saturation: Some(1.2),
                hue: Some(400.0),
                temperature: Some(50.0),
                exposure: Some(-3.0),
                blur: Some(25.0),
                sharpen: Some(1.5),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(
            graph.stages()[1],
            FilterStage::Color(
                "eq=saturation=1.2,hue=h=180,colorbalance=rm=0.15:bm=-0.15,\
                 exposure=exposure=-2,gblur=sigma=20,unsharp=5:5:1.5"
                    .into()
            )
        );
    }

    #[test]
    fn test_zero_blur_and_sharpen_omitted() {
        let graph = compile_effects(ResolvedEffects {
            color: Some(ColorAdjustment {
                blur: Some(0.0),
                sharpen: Some(-1.0),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(graph.stages().len(), 2);
    }

    #[test]
    fn test_geometry_stages_keep_frame() {
        let graph = compile_effects(ResolvedEffects {
            zoom: Some(1.5),
            rotate: Some(90),
            mirror: true,
            flip_vertical: true,
            ..Default::default()
        });
        assert_eq!(
            graph.stages()[1..5],
            [
                FilterStage::Zoom {
                    factor: 1.5,
                    width: 1080,
                    height: 1920
                },
                FilterStage::Rotate {
                    quarter_turns: 1,
                    width: 1080,
                    height: 1920
                },
                FilterStage::Mirror,
                FilterStage::VerticalFlip,
            ]
        );
        assert_eq!(
            graph.stages()[1].render(),
            "scale=1620:2880:flags=bicubic,crop=1080:1920"
        );
        assert_eq!(
            graph.stages()[2].render(),
            "transpose=clock,scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920"
        );
    }

    #[test]
    fn test_rotation_angles() {
        let render = |degrees| {
            compile_effects(ResolvedEffects {
                rotate: Some(degrees),
                ..Default::default()
            })
            .chain()
        };
        assert!(render(180).contains("crop=1080:1920,hflip,vflip,format"));
        assert!(render(-90).contains("transpose=cclock"));
        assert_eq!(render(45), render(0));
        assert_eq!(
            compile_effects(ResolvedEffects {
                zoom: Some(0.5),
                ..Default::default()
            })
            .stages()
            .len(),
            2
        );
    }

    #[test]
    fn test_every_catalog_entry_compiles() {
        for name in STYLIZED_CATALOG {
            let graph = compile_effects(ResolvedEffects {
                stylized: Some(StylizedOverlay::new(*name, 0.7)),
                ..Default::default()
            });
            assert_eq!(graph.stages().len(), 3, "{name}");
            assert!(check_opaque_filter(&graph.chain()).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_unknown_and_none_overlays_skipped() {
        for name in ["none", "lens-flare", ""] {
            let graph = compile_effects(ResolvedEffects {
                stylized: Some(StylizedOverlay::new(name, 0.7)),
                ..Default::default()
            });
            assert_eq!(graph.stages().len(), 2);
        }
    }

    #[test]
    fn test_intensity_clamped() {
        let high = compile_effects(ResolvedEffects {
            stylized: Some(StylizedOverlay::new("bokeh", 7.0)),
            ..Default::default()
        });
        assert!(high.chain().contains("gblur=sigma=20:steps=2"));
    }

    #[test]
    fn test_indicator_window_clamped_to_clip() {
        let settings = IndicatorSettings {
            position: IndicatorPosition::BottomRight,
            window: Some(VisibilityWindow {
                start: 2.0,
                duration: 30.0,
            }),
            ..Default::default()
        };
        let graph = compile_effects(ResolvedEffects {
            indicator: Some(settings),
            ..Default::default()
        });
        let indicator = graph.indicator().unwrap();
        assert_eq!(indicator.number, 3);
        assert_eq!(indicator.window, Some((2.0, 10.0)));
        assert_eq!(
            indicator.overlay_expr(),
            "overlay=W-w-20:H-h-20:format=auto:enable='between(t,2,10)'"
        );
    }

    #[test]
    fn test_indicator_outside_clip_is_dropped() {
        let settings = IndicatorSettings {
            window: Some(VisibilityWindow {
                start: 15.0,
                duration: 3.0,
            }),
            ..Default::default()
        };
        let graph = compile_effects(ResolvedEffects {
            indicator: Some(settings),
            ..Default::default()
        });
        assert!(graph.indicator().is_none());
    }

    #[test]
    fn test_indicator_bad_color() {
        let effects = ResolvedEffects {
            indicator: Some(IndicatorSettings {
                bg_color: "red".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            compile(&effects, &clip(), FrameSize::default()),
            Err(FilterError::InvalidColor("red".into()))
        );
    }

    #[test]
    fn test_filter_complex_without_indicator() {
        let graph = compile_effects(ResolvedEffects {
            mirror: true,
            ..Default::default()
        });
        assert_eq!(
            graph.into_filter_complex(Some("unsharp=5:5:1.0"), 1),
            "[0:v]unsharp=5:5:1.0,scale=1080:1920:force_original_aspect_ratio=increase,\
             crop=1080:1920,hflip,format=yuv420p[vout]"
        );
    }

    #[test]
    fn test_filter_complex_with_indicator() {
        let graph = compile_effects(ResolvedEffects {
            indicator: Some(IndicatorSettings::default()),
            ..Default::default()
        });
        assert_eq!(
            graph.into_filter_complex(None, 1),
            "[0:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920[base];\
             [1:v]format=rgba[ind];[base][ind]overlay=20:20:format=auto,format=yuv420p[vout]"
        );
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(0.1), "0.1");
        assert_eq!(num(-0.05), "-0.05");
        assert_eq!(num(-0.0001), "0");
        assert_eq!(num(15.6667), "15.667");
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff8000").unwrap(), [255, 128, 0]);
        assert!(parse_hex_color("#ff80").is_err());
        assert!(parse_hex_color("ff8000").is_err());
    }
}
