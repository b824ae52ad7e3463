//! GIF frame compositing
//!
//! Frames are drawn in order onto one persistent canvas of the GIF's logical
//! size, and the canvas is snapshotted into the output strip after each
//! frame. Disposal is honored between frames: when the previous frame asked
//! for "restore to background", its rectangle is cleared to transparent
//! before the next frame is drawn. Every other disposal method leaves the
//! canvas as it is, so frames accumulate.

use std::io::Cursor;

use gif::{ColorOutput, DecodeOptions, DisposalMethod};
use image::{ImageBuffer, Rgba, RgbaImage};

use crate::animation::{normalize_delay, DEFAULT_DELAY_MS};
use crate::error::IconError;
use crate::models::{pixel_count, try_alloc};

/// GIF payloads this short are treated as truncated downloads
pub const MIN_GIF_BYTES: usize = 50;

const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A sequence of composed frames stacked into one image.
#[derive(Debug, Clone)]
pub struct ComposedStrip {
    /// `frame_width` x `frame_height * frame_count`
    pub strip: RgbaImage,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Display time per frame in milliseconds
    pub delays: Vec<u16>,
}

impl ComposedStrip {
    pub fn frame_count(&self) -> usize {
        self.delays.len()
    }

    /// Wrap a still image as a single-frame strip.
    pub fn still(image: RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        Self {
            strip: image,
            frame_width: w,
            frame_height: h,
            delays: vec![DEFAULT_DELAY_MS],
        }
    }

    /// Copy of frame `index` as its own image.
    pub fn frame(&self, index: usize) -> RgbaImage {
        let y = index as u32 * self.frame_height;
        image::imageops::crop_imm(&self.strip, 0, y, self.frame_width, self.frame_height).to_image()
    }
}

/// Area a frame touched, kept so it can be disposed before the next one.
#[derive(Debug, Clone, Copy)]
struct FrameRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    dispose: DisposalMethod,
}

fn clear_rect(canvas: &mut RgbaImage, rect: &FrameRect) {
    let x_end = (rect.left + rect.width).min(canvas.width());
    let y_end = (rect.top + rect.height).min(canvas.height());
    for y in rect.top..y_end {
        for x in rect.left..x_end {
            canvas.put_pixel(x, y, CLEAR);
        }
    }
}

/// Draw the opaque pixels of one indexed frame, clipped to the canvas.
fn draw_frame(canvas: &mut RgbaImage, rect: &FrameRect, indices: &[u8], palette: &[u8], transparent: Option<u8>) {
    let (cw, ch) = canvas.dimensions();
    for fy in 0..rect.height {
        let y = rect.top + fy;
        if y >= ch {
            break;
        }
        let row = &indices[(fy * rect.width) as usize..((fy + 1) * rect.width) as usize];
        for (fx, &index) in row.iter().enumerate() {
            let x = rect.left + fx as u32;
            if x >= cw || Some(index) == transparent {
                continue;
            }
            let base = index as usize * 3;
            if let Some(&[r, g, b]) = palette.get(base..base + 3) {
                canvas.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
    }
}

fn blank_image(width: u32, height: u32) -> Result<RgbaImage, IconError> {
    let len = pixel_count(width, height)?
        .checked_mul(4)
        .ok_or_else(|| IconError::Malformed(format!("canvas {}x{} too large", width, height)))?;
    let raw = try_alloc(len, 0u8)?;
    ImageBuffer::from_raw(width, height, raw)
        .ok_or_else(|| IconError::Malformed("canvas size mismatch".to_string()))
}

/// Decode a complete GIF held in memory and compose its frames.
pub fn compose_gif(data: &[u8]) -> Result<ComposedStrip, IconError> {
    if data.len() <= MIN_GIF_BYTES {
        return Err(IconError::Malformed(format!("GIF too short ({} bytes)", data.len())));
    }

    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::Indexed);
    let mut decoder = options.read_info(Cursor::new(data))?;

    let (width, height) = (decoder.width() as u32, decoder.height() as u32);
    if width == 0 || height == 0 {
        return Err(IconError::Malformed(format!("GIF canvas {}x{}", width, height)));
    }
    let global_palette = decoder.global_palette().map(<[u8]>::to_vec);

    let mut canvas = blank_image(width, height)?;
    let frame_bytes = canvas.as_raw().len();
    let mut strip_raw: Vec<u8> = Vec::new();
    let mut delays = Vec::new();
    let mut previous: Option<FrameRect> = None;

    while let Some(frame) = decoder.read_next_frame()? {
        if let Some(prev) = previous.filter(|p| p.dispose == DisposalMethod::Background) {
            clear_rect(&mut canvas, &prev);
        }

        let rect = FrameRect {
            left: frame.left as u32,
            top: frame.top as u32,
            width: frame.width as u32,
            height: frame.height as u32,
            dispose: frame.dispose,
        };
        let palette: &[u8] = match (&frame.palette, &global_palette) {
            (Some(local), _) => local.as_slice(),
            (None, Some(global)) => global.as_slice(),
            (None, None) => {
                return Err(IconError::DecodeFailure(format!(
                    "GIF frame {} has no color table",
                    delays.len()
                )))
            }
        };
        if frame.buffer.len() < pixel_count(rect.width, rect.height)? {
            return Err(IconError::DecodeFailure(format!(
                "GIF frame {} pixel data truncated",
                delays.len()
            )));
        }
        draw_frame(&mut canvas, &rect, &frame.buffer, palette, frame.transparent);

        strip_raw.try_reserve(frame_bytes).map_err(|_| IconError::AllocationFailure {
            bytes: strip_raw.len().saturating_add(frame_bytes),
        })?;
        strip_raw.extend_from_slice(canvas.as_raw());
        delays.push(normalize_delay(frame.delay as u32 * 10));
        previous = Some(rect);
    }

    if delays.is_empty() {
        return Err(IconError::DecodeFailure("GIF has no frames".to_string()));
    }

    let strip_height = height
        .checked_mul(delays.len() as u32)
        .ok_or_else(|| IconError::Malformed("GIF strip too tall".to_string()))?;
    let strip = ImageBuffer::from_raw(width, strip_height, strip_raw)
        .ok_or_else(|| IconError::Malformed("strip size mismatch".to_string()))?;

    log::debug!(
        "composed {} GIF frames at {}x{}, cycle {} ms",
        delays.len(),
        width,
        height,
        delays.iter().map(|&d| d as u32).sum::<u32>()
    );

    Ok(ComposedStrip {
        strip,
        frame_width: width,
        frame_height: height,
        delays,
    })
}
