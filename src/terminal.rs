//! ANSI true-color previews of decoded assets
//!
//! Two source rows share one line of text: each cell is an upper half block
//! whose foreground is the top pixel and background the bottom pixel.
//! Pixels the blitter would skip are shown as dark gray.

use std::fmt::Write;

use image::Rgb;

use crate::color::rgb565_to_rgb;
use crate::draw::{Sprite, ALPHA_THRESHOLD};

/// ANSI escape sequence to reset all formatting
pub const ANSI_RESET: &str = "\x1b[0m";

const HALF_BLOCK: char = '▀';

/// 256-color code used for skipped pixels
const SKIPPED: u8 = 236;

/// Color of a sprite pixel as the display would show it, `None` if skipped.
fn visible(sprite: &Sprite<'_>, x: u32, y: u32) -> Option<Rgb<u8>> {
    if y >= sprite.height {
        return None;
    }
    let i = (y * sprite.width + x) as usize;
    if sprite.alpha[i] <= ALPHA_THRESHOLD {
        return None;
    }
    let (r, g, b) = rgb565_to_rgb(sprite.pixels[i]);
    Some(Rgb([r, g, b]))
}

/// ANSI escape selecting `color` as background (`layer` 48) or foreground
/// (`layer` 38).
///
/// # Examples
///
/// ```
/// use image::Rgb;
/// use pixelicons::terminal::ansi_color;
///
/// assert_eq!(ansi_color(48, Some(Rgb([255, 0, 0]))), "\x1b[48;2;255;0;0m");
/// assert_eq!(ansi_color(38, None), "\x1b[38;5;236m");
/// ```
pub fn ansi_color(layer: u8, color: Option<Rgb<u8>>) -> String {
    match color {
        Some(Rgb([r, g, b])) => format!("\x1b[{};2;{};{};{}m", layer, r, g, b),
        None => format!("\x1b[{};5;{}m", layer, SKIPPED),
    }
}

/// Render a sprite with half-block cells, optionally doubling each pixel.
pub fn render_sprite(sprite: Sprite<'_>, scale: u32) -> String {
    let scale = scale.max(1);
    let (width, height) = (sprite.width * scale, sprite.height * scale);
    let mut output = String::new();
    if width == 0 || height == 0 {
        return output;
    }

    for y in (0..height).step_by(2) {
        for x in 0..width {
            let top = visible(&sprite, x / scale, y / scale);
            let bottom = if y + 1 < height {
                visible(&sprite, x / scale, (y + 1) / scale)
            } else {
                None
            };
            let _ = write!(output, "{}{}{}", ansi_color(48, bottom), ansi_color(38, top), HALF_BLOCK);
        }
        output.push_str(ANSI_RESET);
        output.push('\n');
    }

    output
}
