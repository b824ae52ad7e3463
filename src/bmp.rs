//! 32-bit BMP reading and writing
//!
//! Both single icons and animation strips use the same fixed layout: a
//! 54-byte header followed by unpadded BGRA8888 rows. The sign of the height
//! field gives the row order (negative = top-down).
//!
//! Reading is streamed: each destination row is fetched with one seek and
//! one read of just the span it needs, so a large sheet never has to be
//! resident in memory.

use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use image::RgbaImage;

use crate::color::bgra_to_rgb565;
use crate::error::IconError;
use crate::models::{try_alloc, Bitmap};
use crate::storage::open_asset;

/// Size of the file header plus BITMAPINFOHEADER
pub const HEADER_LEN: usize = 54;

const BITS_PER_PIXEL: u16 = 32;

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// Parsed BMP header fields this pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpHeader {
    pub data_offset: u32,
    pub width: u32,
    pub height: u32,
    /// Rows are stored first-to-last (negative height in the file)
    pub top_down: bool,
}

impl BmpHeader {
    pub fn parse(header: &[u8]) -> Result<Self, IconError> {
        if header.len() < HEADER_LEN {
            return Err(IconError::Malformed(format!(
                "truncated BMP header ({} bytes)",
                header.len()
            )));
        }
        if &header[0..2] != b"BM" {
            return Err(IconError::Malformed("missing BM magic".to_string()));
        }
        let bpp = read_u16(header, 28);
        if bpp != BITS_PER_PIXEL {
            return Err(IconError::Malformed(format!(
                "unsupported bit depth {} (expected 32)",
                bpp
            )));
        }

        let data_offset = read_u32(header, 10);
        let width = read_u32(header, 18) as i32;
        let height = read_u32(header, 22) as i32;
        if width <= 0 || height == 0 || height == i32::MIN {
            return Err(IconError::Malformed(format!(
                "invalid BMP dimensions {}x{}",
                width, height
            )));
        }

        Ok(Self {
            data_offset,
            width: width as u32,
            height: height.unsigned_abs(),
            top_down: height < 0,
        })
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, IconError> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                IconError::Malformed("truncated BMP header".to_string())
            } else {
                IconError::Io(e)
            }
        })?;
        Self::parse(&header)
    }

    /// Storage row holding image row `y`.
    pub fn source_row(&self, y: u32) -> u32 {
        if self.top_down {
            y
        } else {
            self.height - 1 - y
        }
    }

    /// Byte offset of pixel `(x, y)` in image coordinates.
    fn pixel_offset(&self, x: u32, y: u32) -> u64 {
        let row = self.source_row(y) as u64;
        (self.data_offset as u64)
            .saturating_add((row * self.width as u64).saturating_mul(4))
            .saturating_add(x as u64 * 4)
    }
}

/// Decode the rectangle `(x, y, w, h)` of an open BMP stream.
pub fn read_region<R: Read + Seek>(
    reader: &mut R,
    header: &BmpHeader,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> Result<Bitmap, IconError> {
    let fits_x = x.checked_add(w).is_some_and(|end| end <= header.width);
    let fits_y = y.checked_add(h).is_some_and(|end| end <= header.height);
    if w == 0 || h == 0 || !fits_x || !fits_y {
        return Err(IconError::Malformed(format!(
            "region {}x{}+{}+{} outside {}x{} image",
            w, h, x, y, header.width, header.height
        )));
    }

    // The last stored row of the region ends furthest into the stream
    let span_end = header
        .pixel_offset(x, y)
        .max(header.pixel_offset(x, y + h - 1))
        .saturating_add(w as u64 * 4);
    let stream_len = reader.seek(SeekFrom::End(0))?;
    if span_end > stream_len {
        return Err(IconError::Malformed(format!(
            "pixel data truncated: region needs {} bytes, stream has {}",
            span_end, stream_len
        )));
    }

    let mut out = Bitmap::new(w, h)?;
    let mut line = try_alloc(w as usize * 4, 0u8)?;

    for row in 0..h {
        reader.seek(SeekFrom::Start(header.pixel_offset(x, y + row)))?;
        reader.read_exact(&mut line).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                IconError::Malformed(format!("pixel data truncated at row {}", y + row))
            } else {
                IconError::Io(e)
            }
        })?;
        for (col, quad) in line.chunks_exact(4).enumerate() {
            let (pixel, alpha) = bgra_to_rgb565(quad);
            out.set(col as u32, row, pixel, alpha);
        }
    }

    Ok(out)
}

/// Decode a whole BMP from any seekable stream.
pub fn read_bitmap<R: Read + Seek>(reader: &mut R) -> Result<Bitmap, IconError> {
    reader.seek(SeekFrom::Start(0))?;
    let header = BmpHeader::read_from(reader)?;
    read_region(reader, &header, 0, 0, header.width, header.height)
}

/// Decode a whole BMP file.
pub fn load_bitmap(path: &Path) -> Result<Bitmap, IconError> {
    let mut reader = BufReader::new(open_asset(path)?);
    read_bitmap(&mut reader)
}

/// Decode tile `index` of a BMP sheet with `cols` columns.
///
/// `tile_size` receives the image width and returns the memoized tile size.
pub fn load_tile(
    path: &Path,
    cols: u32,
    index: u32,
    tile_size: impl FnOnce(u32) -> Result<(u32, u32), IconError>,
) -> Result<Bitmap, IconError> {
    let mut reader = BufReader::new(open_asset(path)?);
    let header = BmpHeader::read_from(&mut reader)?;
    let (tile_w, tile_h) = tile_size(header.width)?;
    let cols = cols.max(1);
    let (x, y) = tile_origin(index, cols, tile_w, tile_h)?;
    read_region(&mut reader, &header, x, y, tile_w, tile_h)
}

/// Top-left pixel of a tile in a sheet.
pub fn tile_origin(index: u32, cols: u32, tile_w: u32, tile_h: u32) -> Result<(u32, u32), IconError> {
    let x = (index % cols).checked_mul(tile_w);
    let y = (index / cols).checked_mul(tile_h);
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(IconError::Malformed(format!("tile index {} out of range", index))),
    }
}

/// Write an RGBA image as a 32-bit BGRA BMP.
pub fn write_bmp<W: Write>(writer: &mut W, image: &RgbaImage, top_down: bool) -> Result<(), IconError> {
    let (w, h) = image.dimensions();
    let data_size = w
        .checked_mul(h)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IconError::Malformed(format!("image {}x{} too large for BMP", w, h)))?;
    let signed_height = if top_down { -(h as i32) } else { h as i32 };

    let mut header = [0u8; HEADER_LEN];
    header[0..2].copy_from_slice(b"BM");
    header[2..6].copy_from_slice(&(data_size + HEADER_LEN as u32).to_le_bytes());
    header[10..14].copy_from_slice(&(HEADER_LEN as u32).to_le_bytes());
    header[14..18].copy_from_slice(&40u32.to_le_bytes());
    header[18..22].copy_from_slice(&(w as i32).to_le_bytes());
    header[22..26].copy_from_slice(&signed_height.to_le_bytes());
    header[26..28].copy_from_slice(&1u16.to_le_bytes());
    header[28..30].copy_from_slice(&BITS_PER_PIXEL.to_le_bytes());
    header[34..38].copy_from_slice(&data_size.to_le_bytes());
    writer.write_all(&header)?;

    let mut line = try_alloc(w as usize * 4, 0u8)?;
    for i in 0..h {
        let y = if top_down { i } else { h - 1 - i };
        for x in 0..w {
            let [r, g, b, a] = image.get_pixel(x, y).0;
            let o = x as usize * 4;
            line[o..o + 4].copy_from_slice(&[b, g, r, a]);
        }
        writer.write_all(&line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::rgb565;
    use image::Rgba;
    use std::io::Cursor;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 40) as u8, (y * 40) as u8, 200, ((x + y) as u8).wrapping_mul(10)]))
    }

    fn encode(image: &RgbaImage, top_down: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        write_bmp(&mut buf, image, top_down).unwrap();
        buf
    }

    #[test]
    fn test_header_fields() {
        let bytes = encode(&gradient(3, 2), true);
        let header = BmpHeader::parse(&bytes).unwrap();
        assert_eq!(header.data_offset, 54);
        assert_eq!(header.width, 3);
        assert_eq!(header.height, 2);
        assert!(header.top_down);
        assert_eq!(bytes.len(), 54 + 3 * 2 * 4);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&gradient(2, 2), true);
        bytes[0] = b'X';
        assert!(matches!(BmpHeader::parse(&bytes), Err(IconError::Malformed(_))));
    }

    #[test]
    fn test_rejects_24_bit() {
        let mut bytes = encode(&gradient(2, 2), true);
        bytes[28] = 24;
        let err = BmpHeader::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("bit depth 24"));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = encode(&gradient(2, 2), true);
        let err = read_bitmap(&mut Cursor::new(&bytes[..20])).unwrap_err();
        assert!(matches!(err, IconError::Malformed(_)));
    }

    #[test]
    fn test_truncated_pixel_data() {
        let bytes = encode(&gradient(4, 4), true);
        let err = read_bitmap(&mut Cursor::new(&bytes[..bytes.len() - 8])).unwrap_err();
        assert!(matches!(err, IconError::Malformed(_)));
    }

    #[test]
    fn test_oversized_header_rejected_before_decode() {
        let mut bytes = encode(&gradient(2, 2), true);
        bytes.truncate(HEADER_LEN);
        bytes[18..22].copy_from_slice(&20_000i32.to_le_bytes());
        bytes[22..26].copy_from_slice(&(-20_000i32).to_le_bytes());
        let err = read_bitmap(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, IconError::Malformed(_)));
        assert!(err.to_string().contains("stream has 54"));
    }

    #[test]
    fn test_region_of_truncated_sheet() {
        // Bottom-up 8x8 sheet cut short: the top rows live at the end
        let bytes = encode(&gradient(8, 8), false);
        let mut cursor = Cursor::new(&bytes[..bytes.len() - 32]);
        let header = BmpHeader::read_from(&mut cursor).unwrap();
        assert!(read_region(&mut cursor, &header, 0, 4, 4, 4).is_ok());
        let err = read_region(&mut cursor, &header, 0, 0, 4, 4).unwrap_err();
        assert!(matches!(err, IconError::Malformed(_)));
    }

    #[test]
    fn test_top_down_and_bottom_up_decode_identically() {
        let img = gradient(16, 16);
        let top = read_bitmap(&mut Cursor::new(encode(&img, true))).unwrap();
        let bottom = read_bitmap(&mut Cursor::new(encode(&img, false))).unwrap();
        assert_eq!(top, bottom);

        let [r, g, b, a] = img.get_pixel(5, 9).0;
        assert_eq!(top.get(5, 9), (rgb565(r, g, b), a));
    }

    #[test]
    fn test_read_region_extracts_tile() {
        let img = gradient(8, 4);
        let bytes = encode(&img, false);
        let mut cursor = Cursor::new(bytes);
        let header = BmpHeader::read_from(&mut cursor).unwrap();
        let tile = read_region(&mut cursor, &header, 4, 0, 4, 4).unwrap();
        assert_eq!((tile.width, tile.height), (4, 4));
        let [r, g, b, a] = img.get_pixel(6, 3).0;
        assert_eq!(tile.get(2, 3), (rgb565(r, g, b), a));
    }

    #[test]
    fn test_region_out_of_bounds() {
        let bytes = encode(&gradient(8, 8), true);
        let mut cursor = Cursor::new(bytes);
        let header = BmpHeader::read_from(&mut cursor).unwrap();
        assert!(read_region(&mut cursor, &header, 6, 0, 4, 4).is_err());
    }

    #[test]
    fn test_tile_origin() {
        assert_eq!(tile_origin(0, 4, 8, 8).unwrap(), (0, 0));
        assert_eq!(tile_origin(5, 4, 8, 8).unwrap(), (8, 8));
        assert_eq!(tile_origin(3, 4, 16, 8).unwrap(), (48, 0));
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let err = load_bitmap(Path::new("/nonexistent/icon.bmp")).unwrap_err();
        assert!(matches!(err, IconError::NotFound(_)));
    }
}
