//! Configuration loading and discovery for `pixelicons.toml`

use super::schema::IconConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for during discovery
pub const CONFIG_FILE: &str = "pixelicons.toml";

/// Configuration or catalog loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse pixelicons.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Catalog JSON parsing error
    #[error("Failed to parse catalog: {0}")]
    Catalog(#[from] serde_json::Error),
    /// HTTP client could not be built from the network settings
    #[error("Failed to set up HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// Find `pixelicons.toml` by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find `pixelicons.toml` by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration.
///
/// With a path, that file must exist. Without one, the file is discovered
/// with [`find_config`]; when nothing is found the defaults are returned.
pub fn load_config(path: Option<&Path>) -> Result<IconConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(IconConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<IconConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<IconConfig, ConfigError> {
    let config: IconConfig = toml::from_str(contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_find_config_walks_up() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let found = find_config_from(nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[cache]\nanimated_capacity = 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cache.animated_capacity, 3);
    }

    #[test]
    fn test_missing_explicit_path_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/pixelicons.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = parse_config("[cache\nstatic_capacity = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = parse_config("[cache]\nstatic_capacity = 0\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cache.static_capacity"));
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
    }
}
