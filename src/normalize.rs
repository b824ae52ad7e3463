//! Fetch remote icons and convert them to the persisted formats
//!
//! Every remote asset is downloaded into a scratch file under the storage
//! root first, then decoded and written out through an atomic rename. The
//! scratch file is removed when it goes out of scope, whatever the outcome.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::animation::persist_strip;
use crate::bmp::write_bmp;
use crate::compositor::{compose_gif, ComposedStrip};
use crate::error::IconError;
use crate::fetch::{asset_url, Fetcher};
use crate::sheet::decode_rgba;
use crate::storage::Storage;

/// Downloads and converts assets for one storage root.
pub struct Normalizer<'a> {
    storage: &'a Storage,
    fetcher: &'a dyn Fetcher,
    base_url: &'a str,
}

impl<'a> Normalizer<'a> {
    pub fn new(storage: &'a Storage, fetcher: &'a dyn Fetcher, base_url: &'a str) -> Self {
        Self {
            storage,
            fetcher,
            base_url,
        }
    }

    fn download(&self, url: &str) -> Result<NamedTempFile, IconError> {
        let mut tmp = self.storage.temp_file()?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let bytes = self.fetcher.fetch_to(url, &mut writer)?;
            writer.flush()?;
            log::debug!("downloaded {} bytes from {}", bytes, url);
        }
        Ok(tmp)
    }

    fn fetch_still(&self, id: &str) -> Result<image::RgbaImage, IconError> {
        let tmp = self.download(&asset_url(self.base_url, id, "png"))?;
        decode_rgba(BufReader::new(tmp.reopen()?))
    }

    fn fetch_animation(&self, id: &str) -> Result<ComposedStrip, IconError> {
        let tmp = self.download(&asset_url(self.base_url, id, "gif"))?;
        let data = fs::read(tmp.path())?;
        compose_gif(&data)
    }

    /// Fetch the PNG for `id` and store it as a top-down BMP icon.
    pub fn normalize_icon(&self, id: &str) -> Result<PathBuf, IconError> {
        let image = self.fetch_still(id)?;
        let path = self.storage.icon_path(id);
        self.storage.write_atomic(&path, |w| write_bmp(w, &image, true))?;
        log::info!(
            "stored icon {} ({}x{}) at {}",
            id,
            image.width(),
            image.height(),
            path.display()
        );
        Ok(path)
    }

    /// Fetch the GIF for `id` and store it as a strip plus delay sidecar.
    ///
    /// When the GIF cannot be fetched or decoded, the PNG still is stored as
    /// a one-frame strip instead.
    pub fn normalize_animation(&self, id: &str) -> Result<PathBuf, IconError> {
        let composed = match self.fetch_animation(id) {
            Ok(composed) => composed,
            Err(e) => {
                log::debug!("GIF for {} unusable ({}), falling back to PNG", id, e);
                ComposedStrip::still(self.fetch_still(id)?)
            }
        };
        persist_strip(self.storage, id, &composed.strip, &composed.delays)?;
        log::info!(
            "stored animation {} ({} frames of {}x{})",
            id,
            composed.frame_count(),
            composed.frame_width,
            composed.frame_height
        );
        Ok(self.storage.strip_path(id))
    }
}
