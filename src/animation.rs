//! Animation strips: frame layout, delay sidecars and frame selection
//!
//! A strip is a single BMP with every frame stacked vertically. Its
//! companion `.dly` file holds one little-endian `u16` per frame, the frame's
//! display time in milliseconds.

use std::fs;
use std::io::Write;
use std::path::Path;

use image::RgbaImage;

use crate::bmp;
use crate::error::IconError;
use crate::models::Bitmap;
use crate::storage::Storage;

/// Delay used for frames without a recorded one
pub const DEFAULT_DELAY_MS: u16 = 100;

/// Decoder-reported delays below this are replaced by [`DEFAULT_DELAY_MS`]
pub const MIN_DELAY_MS: u16 = 20;

/// Frame layout inferred from strip dimensions: `(frame_count, frame_height)`.
///
/// Square frames are assumed when the height is an exact multiple of the
/// width. An 8-pixel-wide strip is always cut into 8-pixel frames, even if
/// the height is not a multiple of 8. Anything else is a single frame.
///
/// # Examples
///
/// ```
/// use pixelicons::animation::infer_frames;
///
/// assert_eq!(infer_frames(16, 64), (4, 16));
/// assert_eq!(infer_frames(8, 20), (2, 8));
/// assert_eq!(infer_frames(16, 16), (1, 16));
/// ```
pub fn infer_frames(width: u32, height: u32) -> (u32, u32) {
    if width > 0 && height > width && height % width == 0 {
        (height / width, width)
    } else if width == 8 && height > 8 {
        (height / 8, 8)
    } else {
        (1, height)
    }
}

/// Replace implausibly small decoder delays.
pub fn normalize_delay(delay_ms: u32) -> u16 {
    if delay_ms < MIN_DELAY_MS as u32 {
        DEFAULT_DELAY_MS
    } else {
        delay_ms.min(u16::MAX as u32) as u16
    }
}

/// Frame shown at `now_ms` for the given per-frame delays.
///
/// The first frame whose cumulative end time lies beyond the position in
/// the cycle is selected. A zero-length cycle always shows frame 0.
///
/// # Examples
///
/// ```
/// use pixelicons::animation::select_frame;
///
/// let delays = [100, 100, 150, 100, 200];
/// assert_eq!(select_frame(&delays, 650, 120), 1);
/// assert_eq!(select_frame(&delays, 650, 650 + 360), 3);
/// ```
pub fn select_frame(delays: &[u16], total_ms: u32, now_ms: u64) -> usize {
    if total_ms == 0 {
        return 0;
    }
    let in_cycle = now_ms % total_ms as u64;
    let mut elapsed = 0u64;
    for (i, &delay) in delays.iter().enumerate() {
        elapsed += delay as u64;
        if in_cycle < elapsed {
            return i;
        }
    }
    0
}

/// Encode delays as a sidecar payload.
pub fn encode_delays(delays: &[u16]) -> Vec<u8> {
    delays.iter().flat_map(|d| d.to_le_bytes()).collect()
}

/// Read `frame_count` delays from a sidecar payload; missing entries get
/// the default delay.
pub fn decode_delays(data: &[u8], frame_count: u32) -> Vec<u16> {
    let mut chunks = data.chunks_exact(2);
    (0..frame_count)
        .map(|_| {
            chunks
                .next()
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .unwrap_or(DEFAULT_DELAY_MS)
        })
        .collect()
}

/// Read delays from a sidecar file; a missing file means default delays.
pub fn read_delays(path: &Path, frame_count: u32) -> Result<Vec<u16>, IconError> {
    match fs::read(path) {
        Ok(data) => Ok(decode_delays(&data, frame_count)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(vec![DEFAULT_DELAY_MS; frame_count as usize])
        }
        Err(e) => Err(e.into()),
    }
}

/// A strip decoded from storage, ready to become an `AnimatedIcon`.
#[derive(Debug)]
pub struct LoadedStrip {
    pub bitmap: Bitmap,
    pub frame_height: u32,
    pub frame_count: u32,
    pub delays: Vec<u16>,
}

/// Decode a persisted strip and its sidecar.
pub fn load_strip(strip: &Path, sidecar: &Path) -> Result<LoadedStrip, IconError> {
    let bitmap = bmp::load_bitmap(strip)?;
    let (frame_count, frame_height) = infer_frames(bitmap.width, bitmap.height);
    let delays = read_delays(sidecar, frame_count)?;
    Ok(LoadedStrip {
        bitmap,
        frame_height,
        frame_count,
        delays,
    })
}

/// Persist a composed strip and its delays for animation `id`.
///
/// The strip is written bottom-up. Both files go through a temp file and a
/// rename, so a failure never leaves a half-written asset.
pub fn persist_strip(
    storage: &Storage,
    id: &str,
    strip: &RgbaImage,
    delays: &[u16],
) -> Result<(), IconError> {
    storage.write_atomic(&storage.delay_path(id), |w| {
        w.write_all(&encode_delays(delays))?;
        Ok(())
    })?;
    storage.write_atomic(&storage.strip_path(id), |w| bmp::write_bmp(w, strip, false))
}
