//! Configuration schema types for `pixelicons.toml`
//!
//! Defines the structure and validation rules for the icon cache. Every
//! field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where persisted assets live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root; catalog sheet paths resolve under it
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Directory (under root) for static single-icon files
    #[serde(default = "default_icons_dir")]
    pub icons_dir: PathBuf,
    /// Directory (under root) for animation strips and delay sidecars
    #[serde(default = "default_animations_dir")]
    pub animations_dir: PathBuf,
    /// Catalog file (under root)
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            icons_dir: default_icons_dir(),
            animations_dir: default_animations_dir(),
            catalog: default_catalog(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_icons_dir() -> PathBuf {
    PathBuf::from("icons")
}

fn default_animations_dir() -> PathBuf {
    PathBuf::from("iconsan")
}

fn default_catalog() -> PathBuf {
    PathBuf::from("catalog.json")
}

/// Cache bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of decoded static icons
    #[serde(default = "default_static_capacity")]
    pub static_capacity: usize,
    /// Maximum number of decoded animations
    #[serde(default = "default_animated_capacity")]
    pub animated_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_capacity: default_static_capacity(),
            animated_capacity: default_animated_capacity(),
        }
    }
}

fn default_static_capacity() -> usize {
    20
}

fn default_animated_capacity() -> usize {
    10
}

/// Remote icon fetching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Set to false to never touch the network
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// URL prefix; the numeric id and `.png`/`.gif` are appended
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Connect and read timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Redirect hops followed before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    /// Skip TLS certificate validation
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            accept_invalid_certs: true,
            user_agent: default_user_agent(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://developer.lametric.com/content/apps/icon_thumbs/".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_redirects() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!("pixelicons/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Root configuration object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// A single configuration problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "cache.static_capacity")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pixelicons.toml: '{}' {}", self.field, self.message)
    }
}

impl IconConfig {
    /// Validate the configuration and return every problem found
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.cache.static_capacity == 0 {
            errors.push(ConfigValidationError {
                field: "cache.static_capacity".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }
        if self.cache.animated_capacity == 0 {
            errors.push(ConfigValidationError {
                field: "cache.animated_capacity".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.network.enabled {
            if self.network.base_url.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: "network.base_url".to_string(),
                    message: "must be a non-empty URL".to_string(),
                });
            }
            if self.network.timeout_ms == 0 {
                errors.push(ConfigValidationError {
                    field: "network.timeout_ms".to_string(),
                    message: "must be a positive number of milliseconds".to_string(),
                });
            }
        }

        errors
    }
}
