//! PNG sprite-sheet decoding
//!
//! The sheet is pulled through the decoder one scanline at a time. Rows above
//! the requested tile are skipped, decoding stops after the tile's last row,
//! and only the tile's horizontal span of each row is converted.
//!
//! Three encodings are understood:
//! - palette-indexed (1, 2, 4 or 8 bits), alpha taken from the `tRNS` entry
//!   of the index
//! - truecolor RGB, with an optional `tRNS` color key
//! - truecolor RGBA, alpha used as-is
//!
//! 16-bit samples are reduced to their high byte for output, but the RGB
//! color key is matched against the full 16-bit samples.

use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use std::path::Path;

use image::{ImageBuffer, RgbaImage};
use png::{ColorType, Transformations};

use crate::bmp::tile_origin;
use crate::color::rgb565;
use crate::error::IconError;
use crate::models::{pixel_count, try_alloc, Bitmap};
use crate::storage::open_asset;

/// Per-image pixel classification state.
#[derive(Debug, Clone)]
struct PixelFormat {
    color: ColorType,
    /// Bits per sample as stored
    depth: u8,
    palette: Vec<u8>,
    /// Per-index alpha for palette images
    palette_alpha: Vec<u8>,
    /// Transparent color key for RGB images, laid out like one row sample
    color_key: Option<Vec<u8>>,
}

impl PixelFormat {
    fn from_reader<R: Read>(reader: &png::Reader<R>) -> Result<Self, IconError> {
        let info = reader.info();
        let (color, depth) = reader.output_color_type();

        match color {
            ColorType::Indexed | ColorType::Rgb | ColorType::Rgba => {}
            other => {
                return Err(IconError::DecodeFailure(format!(
                    "unsupported PNG color type {:?}",
                    other
                )))
            }
        }

        let palette = info.palette.as_deref().map(<[u8]>::to_vec).unwrap_or_default();
        if color == ColorType::Indexed && palette.is_empty() {
            return Err(IconError::DecodeFailure("indexed PNG without palette".to_string()));
        }

        let trns = info.trns.as_deref();
        let palette_alpha = match (color, trns) {
            (ColorType::Indexed, Some(t)) => t.to_vec(),
            _ => Vec::new(),
        };
        // RGB keys are stored as three big-endian 16-bit samples
        let color_key = match (color, trns) {
            (ColorType::Rgb, Some(t)) if t.len() >= 6 => Some(if depth as u8 == 16 {
                t[..6].to_vec()
            } else {
                vec![t[1], t[3], t[5]]
            }),
            _ => None,
        };

        Ok(Self {
            color,
            depth: depth as u8,
            palette,
            palette_alpha,
            color_key,
        })
    }

    fn sample_bytes(&self) -> usize {
        if self.depth == 16 {
            2
        } else {
            1
        }
    }

    fn palette_index(&self, row: &[u8], x: usize) -> usize {
        if self.depth >= 8 {
            return row[x] as usize;
        }
        let depth = self.depth as usize;
        let per_byte = 8 / depth;
        let byte = row[x / per_byte];
        let shift = 8 - depth * (x % per_byte + 1);
        ((byte >> shift) & ((1u8 << depth) - 1)) as usize
    }

    /// RGBA of pixel `x` in a decoded row.
    fn pixel(&self, row: &[u8], x: usize) -> [u8; 4] {
        match self.color {
            ColorType::Indexed => {
                let idx = self.palette_index(row, x);
                let alpha = self.palette_alpha.get(idx).copied().unwrap_or(255);
                match self.palette.get(idx * 3..idx * 3 + 3) {
                    Some(&[r, g, b]) => [r, g, b, alpha],
                    _ => [0, 0, 0, 0],
                }
            }
            ColorType::Rgb => {
                let step = self.sample_bytes();
                let sample = &row[x * 3 * step..(x + 1) * 3 * step];
                let alpha = if self.color_key.as_deref() == Some(sample) { 0 } else { 255 };
                [sample[0], sample[step], sample[2 * step], alpha]
            }
            _ => {
                let step = self.sample_bytes();
                let i = x * 4 * step;
                [row[i], row[i + step], row[i + 2 * step], row[i + 3 * step]]
            }
        }
    }
}

fn open_reader<R: Read>(source: R) -> Result<png::Reader<R>, IconError> {
    let mut decoder = png::Decoder::new(source);
    decoder.set_transformations(Transformations::IDENTITY);
    Ok(decoder.read_info()?)
}

/// Feed decoded rows to `visit` in image order until it breaks.
fn scan_rows<R: Read>(
    mut reader: png::Reader<R>,
    mut visit: impl FnMut(u32, &[u8]) -> ControlFlow<()>,
) -> Result<(), IconError> {
    if reader.info().interlaced {
        // Adam7 rows arrive out of order; assemble the frame first
        let mut buf = try_alloc(reader.output_buffer_size(), 0u8)?;
        let frame = reader.next_frame(&mut buf)?;
        let rows = buf[..frame.buffer_size()].chunks_exact(frame.line_size);
        for (y, line) in rows.enumerate() {
            if visit(y as u32, line).is_break() {
                break;
            }
        }
        return Ok(());
    }

    let mut y = 0;
    while let Some(row) = reader.next_row()? {
        if visit(y, row.data()).is_break() {
            break;
        }
        y += 1;
    }
    Ok(())
}

/// Decode tile `index` of a PNG sheet with `cols` columns.
///
/// `tile_size` receives the image width and returns the memoized tile size.
pub fn load_tile(
    path: &Path,
    cols: u32,
    index: u32,
    tile_size: impl FnOnce(u32) -> Result<(u32, u32), IconError>,
) -> Result<Bitmap, IconError> {
    let reader = open_reader(BufReader::new(open_asset(path)?))?;
    read_tile(reader, cols, index, tile_size)
}

fn read_tile<R: Read>(
    reader: png::Reader<R>,
    cols: u32,
    index: u32,
    tile_size: impl FnOnce(u32) -> Result<(u32, u32), IconError>,
) -> Result<Bitmap, IconError> {
    let format = PixelFormat::from_reader(&reader)?;
    let (image_w, image_h) = (reader.info().width, reader.info().height);
    let (tile_w, tile_h) = tile_size(image_w)?;
    let (tx, ty) = tile_origin(index, cols.max(1), tile_w, tile_h)?;

    let fits_x = tx.checked_add(tile_w).is_some_and(|end| end <= image_w);
    let fits_y = ty.checked_add(tile_h).is_some_and(|end| end <= image_h);
    if !fits_x || !fits_y {
        return Err(IconError::Malformed(format!(
            "tile {} ({}x{} at {},{}) outside {}x{} sheet",
            index, tile_w, tile_h, tx, ty, image_w, image_h
        )));
    }

    let mut tile = Bitmap::new(tile_w, tile_h)?;
    scan_rows(reader, |y, row| {
        if y < ty {
            return ControlFlow::Continue(());
        }
        if y >= ty + tile_h {
            return ControlFlow::Break(());
        }
        for col in 0..tile_w {
            let [r, g, b, a] = format.pixel(row, (tx + col) as usize);
            tile.set(col, y - ty, rgb565(r, g, b), a);
        }
        ControlFlow::Continue(())
    })?;
    Ok(tile)
}

/// Decode a complete PNG into straight RGBA.
///
/// Used when normalizing fetched stills; applies the same transparency
/// rules as tile extraction.
pub fn decode_rgba<R: Read>(source: R) -> Result<RgbaImage, IconError> {
    let reader = open_reader(source)?;
    let format = PixelFormat::from_reader(&reader)?;
    let (w, h) = (reader.info().width, reader.info().height);

    let len = pixel_count(w, h)?
        .checked_mul(4)
        .ok_or_else(|| IconError::Malformed(format!("PNG {}x{} too large", w, h)))?;
    let mut raw = try_alloc(len, 0u8)?;

    let stride = w as usize * 4;
    scan_rows(reader, |y, row| {
        let start = y as usize * stride;
        let line = &mut raw[start..start + stride];
        for (x, out) in line.chunks_exact_mut(4).enumerate() {
            out.copy_from_slice(&format.pixel(row, x));
        }
        ControlFlow::Continue(())
    })?;

    ImageBuffer::from_raw(w, h, raw)
        .ok_or_else(|| IconError::DecodeFailure("PNG buffer size mismatch".to_string()))
}
