//! On-disk cache for generated and captured images
//!
//! Every store wipes the previous `generated_*` files first, so the cache only
//! ever holds the most recent image. Files are JPEG, named with a millisecond
//! timestamp.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const CACHE_PREFIX: &str = "generated_";

#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `image` as a fresh JPEG and returns its absolute path.
    ///
    /// Blocking: call from `spawn_blocking` when on the runtime.
    pub fn store(&self, image: &DynamicImage) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed creating cache dir {}", self.dir.display()))?;
        self.clear_old_images()?;

        let stamp = chrono::Utc::now().timestamp_millis();
        let path = self.dir.join(format!("{}{}.jpg", CACHE_PREFIX, stamp));

        let file = fs::File::create(&path)
            .with_context(|| format!("failed creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, 100))
            .with_context(|| format!("failed encoding {}", path.display()))?;
        writer.flush()
            .with_context(|| format!("failed writing {}", path.display()))?;

        tracing::debug!(path = %path.display(), "cached image");
        Ok(path)
    }

    /// Deletes every file in the cache dir that carries the cache prefix.
    pub fn clear_old_images(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).context("failed listing cache dir"),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(CACHE_PREFIX) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(file = ?name, "failed removing cached image: {}", e),
                }
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "cleared stale cached images");
        }
        Ok(removed)
    }
}
