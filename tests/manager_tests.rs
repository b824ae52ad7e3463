//! End-to-end lookups through `IconManager`
//!
//! Fixtures are generated in-test: sheets with the png encoder, animations
//! with the gif encoder, local icons with the crate's own BMP writer. The
//! network is replaced by a counting in-memory fetcher.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use image::{Rgba, RgbaImage};
use tempfile::{tempdir, TempDir};

use pixelicons::bmp::write_bmp;
use pixelicons::color::rgb565;
use pixelicons::draw::{DrawTarget, FrameBuffer};
use pixelicons::fetch::Fetcher;
use pixelicons::{Catalog, IconConfig, IconError, IconManager};

const BASE: &str = "https://icons.test/";

/// In-memory transport counting every request.
struct CountingFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: Arc<AtomicUsize>,
}

impl Fetcher for CountingFetcher {
    fn fetch_to(&self, url: &str, out: &mut dyn Write) -> Result<u64, IconError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .get(url)
            .ok_or_else(|| IconError::NetworkFailure(format!("HTTP 404 from {}", url)))?;
        out.write_all(body)?;
        Ok(body.len() as u64)
    }
}

struct Fixture {
    dir: TempDir,
    calls: Arc<AtomicUsize>,
    manager: IconManager,
}

fn config_for(root: &Path, static_capacity: usize) -> IconConfig {
    let mut config = IconConfig::default();
    config.storage.root = root.to_path_buf();
    config.cache.static_capacity = static_capacity;
    config.network.base_url = BASE.to_string();
    config
}

fn fixture_with(catalog: &str, remote: &[(&str, Vec<u8>)], static_capacity: usize) -> Fixture {
    let dir = tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = CountingFetcher {
        bodies: remote.iter().map(|(id, body)| (format!("{}{}", BASE, id), body.clone())).collect(),
        calls: Arc::clone(&calls),
    };
    let manager = IconManager::new(
        config_for(dir.path(), static_capacity),
        Catalog::from_json(catalog).unwrap(),
        Some(Box::new(fetcher)),
    );
    manager.ensure_dirs().unwrap();
    Fixture { dir, calls, manager }
}

fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.write_header().unwrap().write_image_data(image.as_raw()).unwrap();
    out
}

fn write_local_icon(root: &Path, name: &str, image: &RgbaImage) {
    let mut file = File::create(root.join("icons").join(format!("{}.bmp", name))).unwrap();
    write_bmp(&mut file, image, true).unwrap();
}

/// 8x8 GIF whose frames are solid red, green, blue with the given delays.
fn encode_rgb_gif(delays_cs: &[u16]) -> Vec<u8> {
    let palette = [255, 0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0];
    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, 8, 8, &palette).unwrap();
        for (i, &delay) in delays_cs.iter().enumerate() {
            let mut frame = gif::Frame::default();
            frame.width = 8;
            frame.height = 8;
            frame.delay = delay;
            frame.buffer = Cow::Owned(vec![(i % 3) as u8; 64]);
            encoder.write_frame(&frame).unwrap();
        }
    }
    out
}

#[test]
fn catalog_png_sheet_tile_has_sheet_tile_size() {
    let dir = tempdir().unwrap();
    // 2 columns of 16x16 tiles: left tile red, right tile green
    let sheet = RgbaImage::from_fn(32, 16, |x, _| {
        if x < 16 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 255, 0, 255])
        }
    });
    fs::create_dir_all(dir.path().join("sheets")).unwrap();
    fs::write(dir.path().join("sheets/weather.png"), encode_png(&sheet)).unwrap();

    let catalog = Catalog::from_json(
        r#"{
            "sheets": { "weather": { "file": "/sheets/weather.png", "cols": 2 } },
            "icons": { "sun": { "sheet": "weather", "index": 0 }, "leaf": { "sheet": "weather", "index": 1 } }
        }"#,
    )
    .unwrap();
    let manager = IconManager::new(config_for(dir.path(), 20), catalog, None);

    let leaf = manager.get_icon("ic:leaf").unwrap();
    assert_eq!((leaf.width, leaf.height), (16, 16));
    assert!(leaf.pixels.iter().all(|&p| p == rgb565(0, 255, 0)));
    assert_eq!(manager.catalog().sheet("weather").unwrap().cached_tile_size(), Some((16, 16)));

    let sun = manager.get_icon("sun").unwrap();
    assert!(sun.pixels.iter().all(|&p| p == rgb565(255, 0, 0)));
}

#[test]
fn catalog_bmp_sheet_uses_declared_tile_size() {
    let dir = tempdir().unwrap();
    let sheet = RgbaImage::from_fn(32, 16, |x, y| Rgba([(x * 8) as u8, (y * 16) as u8, 0, 255]));
    let mut file = File::create(dir.path().join("misc.bmp")).unwrap();
    write_bmp(&mut file, &sheet, false).unwrap();
    drop(file);

    let catalog = Catalog::from_json(
        r#"{
            "sheets": { "misc": { "file": "misc.bmp", "cols": 4, "tile_width": 8, "tile_height": 8 } },
            "icons": { "dot": { "sheet": "misc", "index": 5 } }
        }"#,
    )
    .unwrap();
    let manager = IconManager::new(config_for(dir.path(), 20), catalog, None);

    let dot = manager.get_icon("dot").unwrap();
    assert_eq!((dot.width, dot.height), (8, 8));
    // Tile 5 with 4 columns starts at (8, 8)
    assert_eq!(dot.pixels[0], rgb565(64, 128, 0));
}

#[test]
fn catalog_tile_outside_sheet_is_memoized() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("tiny.png"), encode_png(&RgbaImage::new(16, 16))).unwrap();
    let catalog = Catalog::from_json(
        r#"{
            "sheets": { "tiny": { "file": "tiny.png" } },
            "icons": { "far": { "sheet": "tiny", "index": 3 } }
        }"#,
    )
    .unwrap();
    let manager = IconManager::new(config_for(dir.path(), 20), catalog, None);

    assert!(manager.get_icon("far").is_none());
    assert!(manager.is_failed("far"));
}

#[test]
fn catalog_index_near_u32_max_is_memoized() {
    let dir = tempdir().unwrap();
    let sheet = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
    fs::write(dir.path().join("one.png"), encode_png(&sheet)).unwrap();
    let catalog = Catalog::from_json(
        r#"{
            "sheets": { "one": { "file": "one.png", "cols": 1 } },
            "icons": { "far": { "sheet": "one", "index": 268435455 } }
        }"#,
    )
    .unwrap();
    let manager = IconManager::new(config_for(dir.path(), 20), catalog, None);

    assert!(manager.get_icon("far").is_none());
    assert!(manager.is_failed("far"));
    assert_eq!(manager.stats().icons.len, 0);
}

#[test]
fn remote_icon_fetched_once_then_cached() {
    let fx = fixture_with("{}", &[("2389.png", encode_png(&RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]))))], 20);

    let first = fx.manager.get_icon("la:2389").unwrap();
    assert_eq!((first.width, first.height), (8, 8));
    assert!(fx.dir.path().join("icons/2389.bmp").is_file());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

    let before = fx.manager.stats();
    let second = fx.manager.get_icon("2389").unwrap();
    let after = fx.manager.stats();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(after.decodes, before.decodes);
    assert_eq!(after.fetches, before.fetches);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_remote_icon_never_refetched() {
    let fx = fixture_with("{}", &[], 20);

    for _ in 0..5 {
        assert!(fx.manager.get_icon("404404").is_none());
    }
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.manager.stats().failed, 1);
}

#[test]
fn non_numeric_names_never_hit_the_network() {
    let fx = fixture_with("{}", &[], 20);
    assert!(fx.manager.get_icon("weather").is_none());
    assert!(fx.manager.get_animated_icon("spinner").is_none());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn capacity_two_evicts_least_recent() {
    let fx = fixture_with("{}", &[], 2);
    for name in ["a", "b", "c"] {
        write_local_icon(fx.dir.path(), name, &RgbaImage::new(16, 16));
    }

    fx.manager.get_icon("a").unwrap();
    fx.manager.get_icon("b").unwrap();
    fx.manager.get_icon("c").unwrap();
    assert_eq!(fx.manager.stats().decodes, 3);
    assert_eq!(fx.manager.stats().icons.evictions, 1);

    fx.manager.get_icon("a").unwrap();
    assert_eq!(fx.manager.stats().decodes, 4);
    fx.manager.get_icon("c").unwrap();
    assert_eq!(fx.manager.stats().decodes, 4);
}

#[test]
fn remote_gif_round_trips_through_strip() {
    let fx = fixture_with("{}", &[("77.gif", encode_rgb_gif(&[10, 10, 15, 10, 20]))], 20);

    let anim = fx.manager.get_animated_icon("77").unwrap();
    assert_eq!(anim.frame_count, 5);
    assert_eq!((anim.width, anim.height), (8, 8));
    assert_eq!(anim.delays, vec![100, 100, 150, 100, 200]);
    assert_eq!(anim.total_time, 650);
    assert_eq!(anim.frame_at(120), 1);

    // A fresh manager over the same root loads the persisted strip offline
    let reloaded = IconManager::new(config_for(fx.dir.path(), 20), Catalog::default(), None);
    let again = reloaded.get_animated_icon("77").unwrap();
    assert_eq!(again.frame_count, 5);
    assert_eq!(again.delays, anim.delays);
    assert_eq!(again.pixels, anim.pixels);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn animation_falls_back_to_png_still() {
    let still = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
    let fx = fixture_with("{}", &[("5.png", encode_png(&still))], 20);

    let anim = fx.manager.get_animated_icon("5").unwrap();
    assert_eq!(anim.frame_count, 1);
    assert_eq!(anim.delays, vec![100]);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn draw_animated_icon_picks_frame_by_time() {
    let fx = fixture_with("{}", &[("8.gif", encode_rgb_gif(&[10, 10, 15]))], 20);
    let mut fb = FrameBuffer::new(32, 16);

    // 120 ms into the cycle is frame 1 (green), drawn doubled to 16x16
    assert!(fx.manager.draw_animated_icon(&mut fb, 0, 0, "8", 120));
    assert_eq!(fb.get(0, 0), Some(rgb565(0, 255, 0)));
    assert_eq!(fb.get(15, 15), Some(rgb565(0, 255, 0)));
    assert_eq!(fb.get(16, 0), Some(0));

    fb.fill(0);
    fx.manager.draw_animated_icon(&mut fb, 0, 0, "8", 0);
    assert_eq!(fb.get(0, 0), Some(rgb565(255, 0, 0)));
}

#[test]
fn local_strip_without_sidecar_uses_default_delays() {
    let fx = fixture_with("{}", &[], 20);
    let strip = RgbaImage::from_pixel(8, 32, Rgba([1, 2, 3, 255]));
    let mut file = File::create(fx.dir.path().join("iconsan/spin.bmp")).unwrap();
    write_bmp(&mut file, &strip, false).unwrap();
    drop(file);

    let anim = fx.manager.get_animated_icon("ln:spin").unwrap();
    assert_eq!(anim.frame_count, 4);
    assert_eq!(anim.delays, vec![100; 4]);
    assert_eq!(fx.manager.animated_icon_width("spin"), 16);
}

#[test]
fn concurrent_lookups_fetch_once() {
    let fx = fixture_with("{}", &[("31.png", encode_png(&RgbaImage::new(16, 16)))], 20);

    thread::scope(|s| {
        for _ in 0..6 {
            s.spawn(|| assert!(fx.manager.get_icon("31").is_some()));
        }
    });
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn manager_draws_onto_custom_target() {
    struct Recorder {
        hits: Vec<(u32, u32, u16)>,
    }

    impl DrawTarget for Recorder {
        fn width(&self) -> u32 {
            4
        }
        fn height(&self) -> u32 {
            4
        }
        fn set_pixel(&mut self, x: u32, y: u32, color: u16) {
            self.hits.push((x, y, color));
        }
    }

    let fx = fixture_with("{}", &[], 20);
    let mut icon = RgbaImage::new(2, 2);
    icon.put_pixel(1, 1, Rgba([255, 0, 0, 200]));
    icon.put_pixel(0, 0, Rgba([255, 0, 0, 10]));
    write_local_icon(fx.dir.path(), "pip", &icon);

    let mut target = Recorder { hits: Vec::new() };
    assert!(fx.manager.draw_icon(&mut target, 2, 2, "pip", true));
    assert_eq!(target.hits, vec![(3, 3, rgb565(255, 0, 0))]);
}
