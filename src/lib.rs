//! Pixelicons - icon and animation asset cache for LED-matrix displays
//!
//! This library provides:
//! - Bounded LRU caches of decoded static icons and animations
//! - Tile extraction from BMP and PNG sprite sheets
//! - GIF compositing into persisted animation strips
//! - Fetching and normalizing remotely hosted icons
//! - Threshold blitting onto an RGB565 draw target

pub mod animation;
pub mod bmp;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod draw;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod models;
pub mod normalize;
pub mod sheet;
pub mod storage;
pub mod terminal;

pub use catalog::Catalog;
pub use config::IconConfig;
pub use error::IconError;
pub use manager::{IconManager, Stats};
