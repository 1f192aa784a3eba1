//! Clip-number indicator rendering.
//!
//! Draws the clip number onto a small transparent PNG that the executor feeds
//! to ffmpeg as an extra input. Three shapes are supported: plain digits,
//! a filled rectangle badge and a filled circle. The background opacity is
//! baked into the alpha channel; digits are always opaque.

use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use sclip_models::{IndicatorSettings, IndicatorStyle};
use tempfile::NamedTempFile;

use crate::error::{MediaError, MediaResult};
use crate::filters::parse_hex_color;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

/// 5x7 digit bitmaps, one row per byte, most significant of the low 5 bits on the left.
const DIGITS: [[u8; 7]; 10] = [
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
];

/// Render the indicator for `number`.
pub fn render_indicator(number: u32, settings: &IndicatorSettings) -> MediaResult<RgbaImage> {
    let [br, bg, bb] = parse_hex_color(&settings.bg_color)?;
    let [tr, tg, tb] = parse_hex_color(&settings.text_color)?;
    let bg_alpha = (settings.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let background = Rgba([br, bg, bb, bg_alpha]);
    let ink = Rgba([tr, tg, tb, 255]);

    let digits: Vec<usize> = number
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();

    // Digits take about 60% of the base size.
    let scale = ((settings.size as f64 * 0.6) / GLYPH_H as f64).round().max(1.0) as u32;
    let text_w = digits.len() as u32 * (GLYPH_W + 1) * scale - scale;
    let text_h = GLYPH_H * scale;

    let (width, height) = match settings.style {
        IndicatorStyle::Simple => (text_w + 10, text_h + 10),
        IndicatorStyle::Badge => (text_w + 40, settings.size.max(text_h) + 20),
        IndicatorStyle::Rounded => {
            let d = text_w.max(text_h) + 40;
            (d, d)
        }
    };

    let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    match settings.style {
        IndicatorStyle::Simple => {}
        IndicatorStyle::Badge => {
            for px in img.pixels_mut() {
                *px = background;
            }
        }
        IndicatorStyle::Rounded => {
            let r = width as f64 / 2.0;
            for (x, y, px) in img.enumerate_pixels_mut() {
                let dx = x as f64 + 0.5 - r;
                let dy = y as f64 + 0.5 - r;
                if dx * dx + dy * dy <= r * r {
                    *px = background;
                }
            }
        }
    }

    let origin_x = (width - text_w) / 2;
    let origin_y = (height - text_h) / 2;
    for (n, digit) in digits.iter().enumerate() {
        let glyph_x = origin_x + n as u32 * (GLYPH_W + 1) * scale;
        for (row, bits) in DIGITS[*digit].iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        img.put_pixel(
                            glyph_x + col * scale + sx,
                            origin_y + row as u32 * scale + sy,
                            ink,
                        );
                    }
                }
            }
        }
    }

    Ok(img)
}

/// Render the indicator into a temporary PNG inside `dir`.
///
/// The file is deleted when the returned handle is dropped.
pub fn write_indicator_png(
    number: u32,
    settings: &IndicatorSettings,
    dir: &Path,
) -> MediaResult<NamedTempFile> {
    let img = render_indicator(number, settings)?;
    let file = tempfile::Builder::new()
        .prefix(&format!("clip-indicator-{}-", number))
        .suffix(".png")
        .tempfile_in(dir)?;
    img.save_with_format(file.path(), ImageFormat::Png)
        .map_err(|e| MediaError::indicator(e.to_string()))?;
    Ok(file)
}
