//! Threshold blitting of decoded assets onto a pixel target
//!
//! There is no blending: a source pixel is either written as-is or skipped,
//! depending on whether its alpha clears [`ALPHA_THRESHOLD`].

/// Source pixels with alpha at or below this value are not drawn
pub const ALPHA_THRESHOLD: u8 = 10;

/// Marker drawn in place of an animation that could not be loaded
pub const MISSING_MARKER: u16 = 0xF800;

/// A surface accepting RGB565 pixels.
pub trait DrawTarget {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Write one pixel. Callers only pass in-bounds coordinates.
    fn set_pixel(&mut self, x: u32, y: u32, color: u16);
}

/// An in-memory RGB565 target, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x < self.width && y < self.height {
            Some(self.pixels[self.index(x, y)])
        } else {
            None
        }
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn fill(&mut self, color: u16) {
        self.pixels.fill(color);
    }

    /// Number of pixels that are not `background`.
    pub fn count_not(&self, background: u16) -> usize {
        self.pixels.iter().filter(|&&p| p != background).count()
    }
}

impl DrawTarget for FrameBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: u16) {
        let i = self.index(x, y);
        self.pixels[i] = color;
    }
}

/// Write `color` at a signed position, dropping it if outside the target.
pub fn put_pixel<T: DrawTarget + ?Sized>(target: &mut T, x: i32, y: i32, color: u16) {
    if x >= 0 && y >= 0 && (x as u32) < target.width() && (y as u32) < target.height() {
        target.set_pixel(x as u32, y as u32, color);
    }
}

/// Source pixels for one blit: a `width x height` window of row-major
/// RGB565 and alpha planes.
#[derive(Debug, Clone, Copy)]
pub struct Sprite<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u16],
    pub alpha: &'a [u8],
}

/// Draw `sprite` with its top-left corner at `(x, y)`, each source pixel
/// magnified to a `scale x scale` block.
pub fn blit<T: DrawTarget + ?Sized>(target: &mut T, x: i32, y: i32, sprite: Sprite<'_>, scale: u32) {
    let scale = scale.max(1) as i32;
    for sy in 0..sprite.height {
        for sx in 0..sprite.width {
            let i = sy as usize * sprite.width as usize + sx as usize;
            if sprite.alpha[i] <= ALPHA_THRESHOLD {
                continue;
            }
            let color = sprite.pixels[i];
            let (ox, oy) = (x + sx as i32 * scale, y + sy as i32 * scale);
            for dy in 0..scale {
                for dx in 0..scale {
                    put_pixel(target, ox + dx, oy + dy, color);
                }
            }
        }
    }
}

/// Magnification for an asset of the given size: 8x8 doubles to 16x16.
pub fn scale_for(width: u32, height: u32) -> u32 {
    if width == 8 && height == 8 {
        2
    } else {
        1
    }
}

/// Layout size reported for an asset dimension: 8 is reported as its
/// magnified 16, a missing asset as 16.
pub fn layout_extent(dimension: Option<u32>) -> u32 {
    match dimension {
        None | Some(8) => 16,
        Some(d) => d,
    }
}
