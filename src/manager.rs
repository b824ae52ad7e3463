//! The icon manager: lookups, resolution and drawing
//!
//! A lookup strips one namespace prefix, probes the matching cache, then the
//! shared failure memo, and only then resolves:
//!
//! - static icons: catalog sheet tile, else `icons/<name>.bmp`, else (numeric
//!   names) the remote PNG normalized to `icons/<name>.bmp`
//! - animations: `iconsan/<id>.bmp`, else (numeric ids) the remote GIF, or
//!   its PNG still, normalized to a strip
//!
//! Timestamps are milliseconds since the manager was created.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::animation::load_strip;
use crate::bmp;
use crate::cache::{AssetCache, CacheStats, FailureMemo};
use crate::catalog::Catalog;
use crate::config::{ConfigError, IconConfig};
use crate::draw::{blit, layout_extent, put_pixel, scale_for, DrawTarget, Sprite, MISSING_MARKER};
use crate::error::IconError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::models::{AnimatedIcon, Bitmap, CachedIcon};
use crate::normalize::Normalizer;
use crate::sheet;
use crate::storage::{is_safe_name, Storage};

/// Namespace prefixes accepted in front of a name
pub const PREFIXES: [&str; 3] = ["ln:", "la:", "ic:"];

/// Strip one recognized namespace prefix.
///
/// # Examples
///
/// ```
/// use pixelicons::manager::normalize_name;
///
/// assert_eq!(normalize_name("ic:sun"), "sun");
/// assert_eq!(normalize_name("la:2389"), "2389");
/// assert_eq!(normalize_name("sun"), "sun");
/// ```
pub fn normalize_name(name: &str) -> &str {
    PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// Whether a name is a remote icon id: non-empty, ASCII digits only.
pub fn is_numeric_id(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Counters across both caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub icons: CacheStats,
    pub animations: CacheStats,
    /// Identifiers in the failure memo
    pub failed: usize,
    /// Resolution attempts that reached a decoder
    pub decodes: u64,
    /// Remote requests issued
    pub fetches: u64,
}

/// Counts requests passing through to the real transport.
struct Metered<'a> {
    inner: &'a dyn Fetcher,
    count: &'a AtomicU64,
}

impl Fetcher for Metered<'_> {
    fn fetch_to(&self, url: &str, out: &mut dyn std::io::Write) -> Result<u64, IconError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.fetch_to(url, out)
    }
}

/// Owns the caches, the failure memo and the resolution pipeline.
pub struct IconManager {
    config: IconConfig,
    storage: Storage,
    catalog: Catalog,
    fetcher: Option<Box<dyn Fetcher>>,
    icons: AssetCache<CachedIcon>,
    animations: AssetCache<AnimatedIcon>,
    failed: FailureMemo,
    epoch: Instant,
    decodes: AtomicU64,
    fetches: AtomicU64,
}

impl IconManager {
    /// Build a manager around an explicit catalog and transport.
    ///
    /// With `fetcher` set to `None` numeric names never reach the network.
    pub fn new(config: IconConfig, catalog: Catalog, fetcher: Option<Box<dyn Fetcher>>) -> Self {
        Self {
            storage: Storage::new(&config.storage),
            icons: AssetCache::new(config.cache.static_capacity),
            animations: AssetCache::new(config.cache.animated_capacity),
            config,
            catalog,
            fetcher,
            failed: FailureMemo::new(),
            epoch: Instant::now(),
            decodes: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// Load the catalog named by the configuration and set up HTTP fetching
    /// if the network is enabled.
    pub fn from_config(config: IconConfig) -> Result<Self, ConfigError> {
        let catalog = Catalog::load(Storage::new(&config.storage).catalog_path())?;
        let fetcher: Option<Box<dyn Fetcher>> = if config.network.enabled {
            Some(Box::new(HttpFetcher::new(&config.network)?))
        } else {
            None
        };
        Ok(Self::new(config, catalog, fetcher))
    }

    /// Create the storage directories.
    pub fn ensure_dirs(&self) -> Result<(), IconError> {
        self.storage.ensure_dirs()
    }

    pub fn config(&self) -> &IconConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Milliseconds since the manager was created.
    pub fn millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Canonical id for an alias tag.
    pub fn resolve_alias(&self, tag: &str) -> Option<&str> {
        self.catalog.resolve_alias(tag)
    }

    pub fn stats(&self) -> Stats {
        Stats {
            icons: self.icons.stats(),
            animations: self.animations.stats(),
            failed: self.failed.len(),
            decodes: self.decodes.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }

    /// Whether `name` is memoized as unresolvable.
    pub fn is_failed(&self, name: &str) -> bool {
        self.failed.contains(normalize_name(name))
    }

    fn normalizer<'a>(&'a self, metered: &'a Metered<'a>) -> Normalizer<'a> {
        Normalizer::new(&self.storage, metered, &self.config.network.base_url)
    }

    fn remote(&self) -> Option<Metered<'_>> {
        self.fetcher.as_deref().map(|inner| Metered {
            inner,
            count: &self.fetches,
        })
    }

    /// Static icon by name, decoding it on first use.
    pub fn get_icon(&self, name: &str) -> Option<Arc<CachedIcon>> {
        let key = normalize_name(name);
        let now = self.millis();
        self.icons.get_or_resolve(key, &self.failed, now, || {
            self.decodes.fetch_add(1, Ordering::Relaxed);
            let bitmap = self.resolve_icon(key)?;
            Ok(CachedIcon::new(key, bitmap, now))
        })
    }

    fn resolve_icon(&self, name: &str) -> Result<Bitmap, IconError> {
        if let Some((sheet_def, index)) = self.catalog.resolve_icon(name) {
            let path = self.storage.sheet_path(&sheet_def.file);
            let tile_size = |width| sheet_def.tile_size(width);
            return if sheet_def.is_png() {
                sheet::load_tile(&path, sheet_def.cols, index, tile_size)
            } else {
                bmp::load_tile(&path, sheet_def.cols, index, tile_size)
            };
        }

        if !is_safe_name(name) {
            return Err(IconError::NotFound(name.to_string()));
        }
        let local = self.storage.icon_path(name);
        if local.is_file() {
            return bmp::load_bitmap(&local);
        }

        match self.remote() {
            Some(metered) if is_numeric_id(name) => {
                let path = self.normalizer(&metered).normalize_icon(name)?;
                bmp::load_bitmap(&path)
            }
            _ => Err(IconError::NotFound(name.to_string())),
        }
    }

    /// Animation by id, loading or fetching its strip on first use.
    pub fn get_animated_icon(&self, id: &str) -> Option<Arc<AnimatedIcon>> {
        let key = normalize_name(id);
        let now = self.millis();
        self.animations.get_or_resolve(key, &self.failed, now, || {
            self.decodes.fetch_add(1, Ordering::Relaxed);
            self.resolve_animation(key, now)
        })
    }

    fn resolve_animation(&self, id: &str, now: u64) -> Result<AnimatedIcon, IconError> {
        if !is_safe_name(id) {
            return Err(IconError::NotFound(id.to_string()));
        }
        let strip_path = self.storage.strip_path(id);
        if !strip_path.is_file() {
            match self.remote() {
                Some(metered) if is_numeric_id(id) => {
                    self.normalizer(&metered).normalize_animation(id)?;
                }
                _ => return Err(IconError::NotFound(id.to_string())),
            }
        }
        let strip = load_strip(&strip_path, &self.storage.delay_path(id))?;
        Ok(AnimatedIcon::new(
            id,
            strip.bitmap,
            strip.frame_height,
            strip.frame_count,
            strip.delays,
            now,
        ))
    }

    /// Draw a static icon at `(x, y)`. 8x8 icons are doubled when
    /// `scale_to_16` is set. Returns false if the icon is unavailable.
    pub fn draw_icon<T: DrawTarget + ?Sized>(
        &self,
        target: &mut T,
        x: i32,
        y: i32,
        name: &str,
        scale_to_16: bool,
    ) -> bool {
        let Some(icon) = self.get_icon(name) else {
            return false;
        };
        let scale = if scale_to_16 { scale_for(icon.width, icon.height) } else { 1 };
        let sprite = Sprite {
            width: icon.width,
            height: icon.height,
            pixels: &icon.pixels,
            alpha: &icon.alpha,
        };
        blit(target, x, y, sprite, scale);
        true
    }

    /// Draw the frame of an animation due at `now_ms`. 8x8 frames are always
    /// doubled. An unavailable animation draws a single red pixel at
    /// `(x, y)` and returns false.
    pub fn draw_animated_icon<T: DrawTarget + ?Sized>(
        &self,
        target: &mut T,
        x: i32,
        y: i32,
        id: &str,
        now_ms: u64,
    ) -> bool {
        let Some(anim) = self.get_animated_icon(id) else {
            put_pixel(target, x, y, MISSING_MARKER);
            return false;
        };
        let start = anim.frame_offset(anim.frame_at(now_ms));
        let len = (anim.width * anim.height) as usize;
        let sprite = Sprite {
            width: anim.width,
            height: anim.height,
            pixels: &anim.pixels[start..start + len],
            alpha: &anim.alpha[start..start + len],
        };
        blit(target, x, y, sprite, scale_for(anim.width, anim.height));
        true
    }

    /// Layout width of a static icon.
    pub fn icon_width(&self, name: &str) -> u32 {
        layout_extent(self.get_icon(name).map(|i| i.width))
    }

    /// Layout height of a static icon.
    pub fn icon_height(&self, name: &str) -> u32 {
        layout_extent(self.get_icon(name).map(|i| i.height))
    }

    /// Layout width of an animation.
    pub fn animated_icon_width(&self, id: &str) -> u32 {
        layout_extent(self.get_animated_icon(id).map(|a| a.width))
    }
}
