//! Decoded asset types held by the caches
//!
//! Buffers are plain owned vectors whose lengths always match the declared
//! dimensions. Cache slots hand out `Arc` handles, so an evicted entry is
//! released once the last reader drops it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::IconError;

/// Reserve and fill a buffer without aborting on allocation failure.
pub(crate) fn try_alloc<T: Clone>(len: usize, fill: T) -> Result<Vec<T>, IconError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| IconError::AllocationFailure {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    buf.resize(len, fill);
    Ok(buf)
}

/// `width * height` with overflow checking.
pub(crate) fn pixel_count(width: u32, height: u32) -> Result<usize, IconError> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| IconError::Malformed(format!("dimensions {}x{} overflow", width, height)))
}

/// RGB565 pixels plus an independent alpha plane, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u16>,
    pub alpha: Vec<u8>,
}

impl Bitmap {
    /// Allocate a fully transparent bitmap.
    pub fn new(width: u32, height: u32) -> Result<Self, IconError> {
        let len = pixel_count(width, height)?;
        let pixels = try_alloc(len, 0u16)?;
        let alpha = try_alloc(len, 0u8)?;
        Ok(Self {
            width,
            height,
            pixels,
            alpha,
        })
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, pixel: u16, alpha: u8) {
        let i = self.index(x, y);
        self.pixels[i] = pixel;
        self.alpha[i] = alpha;
    }

    /// Returns `(rgb565, alpha)` at the given position.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> (u16, u8) {
        let i = self.index(x, y);
        (self.pixels[i], self.alpha[i])
    }
}

/// A decoded static icon.
#[derive(Debug)]
pub struct CachedIcon {
    /// Cache key (the normalized name)
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// RGB565, `width * height` entries
    pub pixels: Vec<u16>,
    /// 8-bit alpha, `width * height` entries
    pub alpha: Vec<u8>,
    last_used: AtomicU64,
}

impl CachedIcon {
    pub fn new(name: impl Into<String>, bitmap: Bitmap, now_ms: u64) -> Self {
        Self {
            name: name.into(),
            width: bitmap.width,
            height: bitmap.height,
            pixels: bitmap.pixels,
            alpha: bitmap.alpha,
            last_used: AtomicU64::new(now_ms),
        }
    }

    /// Milliseconds since manager start at the last cache access.
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}

/// A decoded animation: frames stacked vertically in one buffer.
#[derive(Debug)]
pub struct AnimatedIcon {
    pub name: String,
    /// Width of every frame
    pub width: u32,
    /// Height of a single frame
    pub height: u32,
    /// Height of the whole strip
    pub total_height: u32,
    pub frame_count: u32,
    /// Per-frame display time in milliseconds, `frame_count` entries
    pub delays: Vec<u16>,
    /// Sum of `delays`
    pub total_time: u32,
    /// RGB565, `width * total_height` entries
    pub pixels: Vec<u16>,
    /// 8-bit alpha, `width * total_height` entries
    pub alpha: Vec<u8>,
    last_used: AtomicU64,
}

impl AnimatedIcon {
    /// Build an animation from a decoded strip.
    ///
    /// `delays` must hold exactly `frame_count` entries.
    pub fn new(
        name: impl Into<String>,
        strip: Bitmap,
        frame_height: u32,
        frame_count: u32,
        delays: Vec<u16>,
        now_ms: u64,
    ) -> Self {
        debug_assert_eq!(delays.len(), frame_count as usize);
        let total_time = delays.iter().map(|&d| d as u32).sum();
        Self {
            name: name.into(),
            width: strip.width,
            height: frame_height,
            total_height: strip.height,
            frame_count,
            delays,
            total_time,
            pixels: strip.pixels,
            alpha: strip.alpha,
            last_used: AtomicU64::new(now_ms),
        }
    }

    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    /// Index of the frame to show at `now_ms`, matched against the running
    /// sum of per-frame delays.
    pub fn frame_at(&self, now_ms: u64) -> usize {
        crate::animation::select_frame(&self.delays, self.total_time, now_ms)
    }

    /// Pixel offset of the first pixel of `frame` in the strip buffers.
    pub fn frame_offset(&self, frame: usize) -> usize {
        frame * self.width as usize * self.height as usize
    }
}

/// Access-time bookkeeping shared by both cache entry kinds.
pub trait CacheEntry: Send + Sync {
    fn touch(&self, now_ms: u64);
}

impl CacheEntry for CachedIcon {
    fn touch(&self, now_ms: u64) {
        self.last_used.store(now_ms, Ordering::Relaxed);
    }
}

impl CacheEntry for AnimatedIcon {
    fn touch(&self, now_ms: u64) {
        self.last_used.store(now_ms, Ordering::Relaxed);
    }
}
