//! On-disk layout of persisted assets
//!
//! ```text
//! <root>/
//!   catalog.json
//!   icons/<name>.bmp      static single icons
//!   iconsan/<id>.bmp      animation strips
//!   iconsan/<id>.dly      per-frame delay sidecars
//! ```
//!
//! Sheet paths from the catalog are resolved under the root as well; a
//! leading `/` is accepted and ignored.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::StorageConfig;
use crate::error::IconError;

/// Resolves asset paths under a storage root.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    icons: PathBuf,
    animations: PathBuf,
    catalog: PathBuf,
}

impl Storage {
    pub fn new(config: &StorageConfig) -> Self {
        let root = config.root.clone();
        Self {
            icons: root.join(&config.icons_dir),
            animations: root.join(&config.animations_dir),
            catalog: root.join(&config.catalog),
            root,
        }
    }

    /// Storage with the default directory names under `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self::new(&StorageConfig {
            root: root.into(),
            ..StorageConfig::default()
        })
    }

    /// Create the icon and animation directories if missing.
    pub fn ensure_dirs(&self) -> Result<(), IconError> {
        fs::create_dir_all(&self.icons)?;
        fs::create_dir_all(&self.animations)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog
    }

    pub fn icon_path(&self, name: &str) -> PathBuf {
        self.icons.join(format!("{}.bmp", name))
    }

    pub fn strip_path(&self, id: &str) -> PathBuf {
        self.animations.join(format!("{}.bmp", id))
    }

    pub fn delay_path(&self, id: &str) -> PathBuf {
        self.animations.join(format!("{}.dly", id))
    }

    /// Resolve a catalog sheet path under the root.
    pub fn sheet_path(&self, file: &str) -> PathBuf {
        self.root.join(file.trim_start_matches('/'))
    }

    /// A scratch file in the storage root, removed on drop.
    pub fn temp_file(&self) -> Result<NamedTempFile, IconError> {
        fs::create_dir_all(&self.root)?;
        Ok(NamedTempFile::new_in(&self.root)?)
    }

    /// Write `path` through a temp file in the same directory and rename it
    /// into place once `fill` succeeds.
    pub fn write_atomic<F>(&self, path: &Path, fill: F) -> Result<(), IconError>
    where
        F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), IconError>,
    {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            fill(&mut writer)?;
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| IconError::Io(e.error))?;
        Ok(())
    }
}

/// Whether a name is safe to use as a file stem under the storage root.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Open an asset for reading, mapping a missing file to `NotFound`.
pub(crate) fn open_asset(path: &Path) -> Result<File, IconError> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IconError::NotFound(path.display().to_string())
        } else {
            IconError::Io(e)
        }
    })
}
