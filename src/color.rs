//! RGB565 packing used by the LED matrix
//!
//! Decoded assets keep color as packed 16-bit RGB565 values next to a
//! separate 8-bit alpha plane.

use image::Rgba;

/// Pack 8-bit channels into RGB565 by truncating the low bits.
///
/// # Examples
///
/// ```
/// use pixelicons::color::rgb565;
///
/// assert_eq!(rgb565(255, 0, 0), 0xF800);
/// assert_eq!(rgb565(0, 255, 0), 0x07E0);
/// assert_eq!(rgb565(0, 0, 255), 0x001F);
/// ```
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Expand an RGB565 value back to 8-bit channels, replicating high bits into
/// the low ones so full intensity maps to 255.
pub fn rgb565_to_rgb(value: u16) -> (u8, u8, u8) {
    let r5 = ((value >> 11) & 0x1F) as u8;
    let g6 = ((value >> 5) & 0x3F) as u8;
    let b5 = (value & 0x1F) as u8;
    ((r5 << 3) | (r5 >> 2), (g6 << 2) | (g6 >> 4), (b5 << 3) | (b5 >> 2))
}

/// Convert a BGRA8888 quad (BMP byte order) into `(rgb565, alpha)`.
#[inline]
pub fn bgra_to_rgb565(quad: &[u8]) -> (u16, u8) {
    (rgb565(quad[2], quad[1], quad[0]), quad[3])
}

/// Rebuild an RGBA color from a packed pixel and its alpha sample.
pub fn to_rgba(value: u16, alpha: u8) -> Rgba<u8> {
    let (r, g, b) = rgb565_to_rgb(value);
    Rgba([r, g, b, alpha])
}
