//! Icon catalog: sprite sheets, icon entries and alias tags
//!
//! The catalog is read once at startup and shared read-only. The only
//! mutation is the write-once tile size on each sheet, filled in from the
//! sheet's image width the first time one of its tiles is decoded.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer};

use crate::config::ConfigError;
use crate::error::IconError;

fn default_cols() -> u32 {
    1
}

/// A sprite sheet image holding fixed-size tiles.
#[derive(Debug, Deserialize)]
pub struct SheetDefinition {
    /// Image path (`.png` selects the PNG decoder, anything else BMP)
    pub file: String,
    /// Tiles per row
    #[serde(default = "default_cols")]
    pub cols: u32,
    /// Explicit tile width; derived from the image width when absent
    #[serde(default)]
    pub tile_width: Option<u32>,
    /// Explicit tile height; equal to the tile width when absent
    #[serde(default)]
    pub tile_height: Option<u32>,
    #[serde(skip)]
    tile_size: OnceLock<(u32, u32)>,
}

impl SheetDefinition {
    pub fn new(file: impl Into<String>, cols: u32) -> Self {
        Self {
            file: file.into(),
            cols,
            tile_width: None,
            tile_height: None,
            tile_size: OnceLock::new(),
        }
    }

    /// Whether the sheet is decoded with the PNG decoder.
    pub fn is_png(&self) -> bool {
        self.file.to_ascii_lowercase().ends_with(".png")
    }

    /// Tile dimensions, computed from `image_width` on the first call and
    /// memoized for every later decode.
    pub fn tile_size(&self, image_width: u32) -> Result<(u32, u32), IconError> {
        let &(w, h) = self.tile_size.get_or_init(|| {
            let w = self.tile_width.unwrap_or(image_width / self.cols.max(1));
            (w, self.tile_height.unwrap_or(w))
        });
        if w == 0 || h == 0 {
            return Err(IconError::Malformed(format!(
                "sheet '{}' has zero-sized tiles ({} px wide, {} columns)",
                self.file, image_width, self.cols
            )));
        }
        Ok((w, h))
    }

    /// The memoized tile size, if a tile has been decoded already.
    pub fn cached_tile_size(&self) -> Option<(u32, u32)> {
        self.tile_size.get().copied()
    }
}

/// A catalog icon: one tile of a named sheet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IconDefinition {
    pub sheet: String,
    pub index: u32,
}

/// Accepts alias targets written either as strings or as bare numbers.
fn deserialize_aliases<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Target {
        Text(String),
        Number(u64),
    }

    let raw = HashMap::<String, Target>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(tag, target)| {
            let id = match target {
                Target::Text(s) => s,
                Target::Number(n) => n.to_string(),
            };
            (tag, id)
        })
        .collect())
}

/// Sheets, icons and aliases as loaded from `catalog.json`.
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub sheets: HashMap<String, SheetDefinition>,
    #[serde(default)]
    pub icons: HashMap<String, IconDefinition>,
    #[serde(default, deserialize_with = "deserialize_aliases")]
    pub aliases: HashMap<String, String>,
}

impl Catalog {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a catalog file. A missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no catalog at {}, starting empty", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Canonical id for an alias tag.
    pub fn resolve_alias(&self, tag: &str) -> Option<&str> {
        self.aliases.get(tag).map(String::as_str)
    }

    pub fn icon(&self, name: &str) -> Option<&IconDefinition> {
        self.icons.get(name)
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetDefinition> {
        self.sheets.get(name)
    }

    /// The sheet and tile index backing a catalog icon.
    ///
    /// Returns `None` when the icon is unknown or names a missing sheet.
    pub fn resolve_icon(&self, name: &str) -> Option<(&SheetDefinition, u32)> {
        let icon = self.icon(name)?;
        let sheet = self.sheet(&icon.sheet)?;
        Some((sheet, icon.index))
    }
}
