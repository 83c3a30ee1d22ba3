//! Diagnostic fallback image rendering.
//!
//! When no decoder recognizes the input, the output is still a valid JPEG:
//! a fixed 360x240 canvas with four lines of text naming the failure, the
//! input file, what the recipient should do, and the program version. The
//! canvas dimensions, anchors and font sizes are build-time constants, not
//! derived from input.

use std::io::Write;
use std::sync::OnceLock;

use fontdue::{Font, FontSettings};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::encode;
use crate::errors::{NormalizeError, Result};
use crate::PROGRAM_BANNER;

/// Embedded at build time; parsing can only fail under broken packaging, so
/// a failure here is fatal rather than recoverable.
static FONT_BYTES: &[u8] = include_bytes!("../fonts/DejaVuSans.ttf");

static FONT: OnceLock<Font> = OnceLock::new();

pub const CANVAS_WIDTH: u32 = 360;
pub const CANVAS_HEIGHT: u32 = 240;

/// Opaque pale cyan, the fill for every untouched pixel.
pub const FILL: Rgba<u8> = Rgba([100, 200, 200, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// All four lines share this left margin.
const TEXT_X: i32 = 15;

const DECODE_FAILED_MSG: &str = "Image file cannot be decoded!";
const INSTRUCTION_MSG: &str = "Please refer to the original email.";

fn font() -> Result<&'static Font> {
    if let Some(font) = FONT.get() {
        return Ok(font);
    }
    let parsed = Font::from_bytes(FONT_BYTES, FontSettings::default())
        .map_err(|e| NormalizeError::FontParse(e.to_string()))?;
    Ok(FONT.get_or_init(|| parsed))
}

/// Build the diagnostic canvas for `filename` (the input's base name).
pub fn render_failure_image(filename: &str) -> Result<RgbaImage> {
    let mut canvas = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, FILL);

    draw_text(&mut canvas, DECODE_FAILED_MSG, TEXT_X, 50, 24.0)?;
    draw_text(&mut canvas, filename, TEXT_X, 100, 18.0)?;
    draw_text(&mut canvas, INSTRUCTION_MSG, TEXT_X, 150, 18.0)?;
    draw_text(&mut canvas, PROGRAM_BANNER, TEXT_X, 200, 12.0)?;

    Ok(canvas)
}

/// Render the canvas and encode it as JPEG.
pub fn write_failure_image<W: Write>(writer: &mut W, filename: &str) -> Result<()> {
    let canvas = render_failure_image(filename)?;
    encode::write_jpeg(writer, &DynamicImage::ImageRgba8(canvas))
}

/// Draw `text` left to right from the baseline anchor `(x, y)`.
///
/// Point sizes map 1:1 to pixels at the fixed 72 dpi. Glyph pixels outside
/// the canvas are dropped; overrunning text is simply not visible.
fn draw_text(canvas: &mut RgbaImage, text: &str, x: i32, y: i32, size: f32) -> Result<()> {
    let font = font()?;
    let mut cursor = x as f32;

    for ch in text.chars() {
        let (metrics, coverage) = font.rasterize(ch, size);
        let origin_x = cursor.round() as i32 + metrics.xmin;
        let origin_y = y - metrics.height as i32 - metrics.ymin;

        for (row, row_coverage) in coverage.chunks(metrics.width.max(1)).enumerate() {
            for (col, &alpha) in row_coverage.iter().enumerate() {
                if alpha == 0 {
                    continue;
                }
                let px = origin_x + col as i32;
                let py = origin_y + row as i32;
                if px < 0 || py < 0 || px >= CANVAS_WIDTH as i32 || py >= CANVAS_HEIGHT as i32 {
                    continue;
                }
                blend(canvas.get_pixel_mut(px as u32, py as u32), alpha);
            }
        }
        cursor += metrics.advance_width;
    }

    Ok(())
}

/// Composite the text color over `pixel` with the glyph's alpha coverage.
fn blend(pixel: &mut Rgba<u8>, coverage: u8) {
    let a = coverage as u32;
    for i in 0..3 {
        let bg = pixel.0[i] as u32;
        let fg = TEXT_COLOR.0[i] as u32;
        pixel.0[i] = ((fg * a + bg * (255 - a)) / 255) as u8;
    }
    pixel.0[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    /// Any pixel this dark in a text band has to come from a glyph.
    fn band_has_text(canvas: &RgbaImage, baseline: u32, size: u32) -> bool {
        let top = baseline.saturating_sub(size);
        (top..=baseline).any(|y| (0..CANVAS_WIDTH).any(|x| canvas.get_pixel(x, y).0[0] < 60))
    }

    #[test]
    fn test_canvas_dimensions_and_fill() {
        let canvas = render_failure_image("photo.bin").unwrap();
        assert_eq!(canvas.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));

        // Corners sit outside every text line and keep the fill exactly.
        for (x, y) in [(0, 0), (359, 0), (0, 239), (359, 239)] {
            assert_eq!(*canvas.get_pixel(x, y), FILL);
        }
    }

    #[test]
    fn test_all_four_lines_are_drawn() {
        let canvas = render_failure_image("photo.bin").unwrap();
        for (baseline, size) in [(50, 24), (100, 18), (150, 18), (200, 12)] {
            assert!(
                band_has_text(&canvas, baseline, size),
                "no text found in band ending at y={}",
                baseline
            );
        }
    }

    #[test]
    fn test_empty_filename_still_renders() {
        let canvas = render_failure_image("").unwrap();
        assert_eq!(canvas.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        // Line 1 and 3 are fixed messages and must still show up.
        assert!(band_has_text(&canvas, 50, 24));
        assert!(band_has_text(&canvas, 150, 18));
    }

    #[test]
    fn test_overlong_filename_is_clipped_not_fatal() {
        let long_name = "x".repeat(500);
        let canvas = render_failure_image(&long_name).unwrap();
        assert_eq!(canvas.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
    }

    #[test]
    fn test_encoded_fallback_round_trips() {
        let mut out = Vec::new();
        write_failure_image(&mut out, "broken.dat").unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));

        // JPEG is lossy even at quality 100; corners stay close to the fill.
        let rgba = decoded.to_rgba8();
        for (x, y) in [(0, 0), (359, 0), (0, 239), (359, 239)] {
            let p = rgba.get_pixel(x, y);
            for i in 0..3 {
                let delta = (p.0[i] as i16 - FILL.0[i] as i16).abs();
                assert!(delta <= 12, "corner ({x},{y}) channel {i} off by {delta}");
            }
        }
    }
}
