use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crop::CropRect;

const INDEX_FILE: &str = "photos.json";
const JPEG_QUALITY: u8 = 80;

/// One stored photo: the persisted analog of an entry in the captured list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Time-based identifier (unix milliseconds at capture).
    pub id: String,
    /// File name of the primary image, relative to the store directory.
    pub file: String,
    /// File name of the uncropped original, kept when a crop was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file: Option<String>,
    /// The crop that produced the primary image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRect>,
    pub timestamp: DateTime<Utc>,
}

/// Ordered photo list persisted as JPEG files plus a single JSON index.
pub struct PhotoStore {
    dir: PathBuf,
    photos: Vec<PhotoRecord>,
}

impl PhotoStore {
    /// Open (or create) the store at `dir` and load the photo list.
    ///
    /// A missing index yields an empty list; an unparseable index resets the
    /// list instead of failing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<PhotoStore> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;

        let index = dir.join(INDEX_FILE);
        let photos = if index.exists() {
            let raw = fs::read_to_string(&index)?;
            match serde_json::from_str::<Vec<PhotoRecord>>(&raw) {
                Ok(photos) => photos,
                Err(e) => {
                    warn!("Resetting photo list, could not parse {}: {e}", index.display());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(PhotoStore { dir, photos })
    }

    pub fn photos(&self) -> &[PhotoRecord] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Append a photo to the list, writing its image files and the index.
    pub fn add(
        &mut self,
        photo: &RgbImage,
        original: Option<&RgbImage>,
        crop: Option<CropRect>,
    ) -> Result<PhotoRecord> {
        let timestamp = Utc::now();
        let mut millis = timestamp.timestamp_millis();
        while self.photos.iter().any(|p| p.id == millis.to_string()) {
            millis += 1;
        }
        let id = millis.to_string();

        let file = format!("photo_{id}.jpg");
        fs::write(self.dir.join(&file), encode_jpeg(photo)?)?;

        let original_file = match original {
            Some(img) => {
                let name = format!("original_{id}.jpg");
                fs::write(self.dir.join(&name), encode_jpeg(img)?)?;
                Some(name)
            }
            None => None,
        };

        let record = PhotoRecord {
            id,
            file,
            original_file,
            crop,
            timestamp,
        };
        self.photos.push(record.clone());
        self.persist()?;

        Ok(record)
    }

    /// Remove one photo and its files. Returns whether the id was present.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.photos.iter().position(|p| p.id == id) else {
            return Ok(false);
        };

        let record = self.photos.remove(pos);
        self.delete_files(&record);
        self.persist()?;

        Ok(true)
    }

    /// Remove every photo, its files, and the index itself.
    pub fn clear(&mut self) -> Result<()> {
        for record in std::mem::take(&mut self.photos) {
            self.delete_files(&record);
        }

        let index = self.dir.join(INDEX_FILE);
        if index.exists() {
            fs::remove_file(index)?;
        }

        Ok(())
    }

    pub fn image_path(&self, record: &PhotoRecord) -> PathBuf {
        self.dir.join(&record.file)
    }

    pub fn load_image(&self, record: &PhotoRecord) -> Result<RgbImage> {
        let path = self.image_path(record);
        let img = image::open(&path)
            .with_context(|| format!("failed to read photo {}", path.display()))?;
        Ok(img.into_rgb8())
    }

    fn delete_files(&self, record: &PhotoRecord) {
        for name in std::iter::once(&record.file).chain(record.original_file.iter()) {
            let path = self.dir.join(name);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not delete {}: {e}", path.display());
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.photos)?;
        fs::write(self.dir.join(INDEX_FILE), raw)?;
        Ok(())
    }
}

fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn photo(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]))
    }

    #[test]
    fn add_persists_and_reloads_in_order() {
        let dir = tempdir().unwrap();

        let mut store = PhotoStore::open(dir.path()).unwrap();
        let first = store.add(&photo(40, 30), None, None).unwrap();
        let second = store.add(&photo(40, 30), None, None).unwrap();
        assert_ne!(first.id, second.id);

        let reloaded = PhotoStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.photos()[0].id, first.id);
        assert_eq!(reloaded.photos()[1].id, second.id);
        assert!(reloaded.image_path(&reloaded.photos()[0]).exists());
    }

    #[test]
    fn crop_and_original_round_trip() {
        let dir = tempdir().unwrap();
        let crop = CropRect {
            x: 5,
            y: 0,
            width: 20,
            height: 25,
        };

        let mut store = PhotoStore::open(dir.path()).unwrap();
        store
            .add(&photo(20, 25), Some(&photo(40, 30)), Some(crop))
            .unwrap();

        let reloaded = PhotoStore::open(dir.path()).unwrap();
        let record = &reloaded.photos()[0];
        assert_eq!(record.crop, Some(crop));
        let original = record.original_file.as_ref().unwrap();
        assert!(dir.path().join(original).exists());

        let img = reloaded.load_image(record).unwrap();
        assert_eq!(img.dimensions(), (20, 25));
    }

    #[test]
    fn corrupt_index_resets_the_list() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "not json at all").unwrap();

        let store = PhotoStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn missing_index_is_an_empty_list() {
        let dir = tempdir().unwrap();
        let store = PhotoStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn remove_deletes_record_and_files() {
        let dir = tempdir().unwrap();

        let mut store = PhotoStore::open(dir.path()).unwrap();
        let kept = store.add(&photo(40, 30), None, None).unwrap();
        let removed = store.add(&photo(40, 30), Some(&photo(40, 30)), None).unwrap();

        assert!(store.remove(&removed.id).unwrap());
        assert!(!store.remove("missing").unwrap());

        let removed_photo = dir.path().join(&removed.file);
        assert!(!removed_photo.exists());

        let reloaded = PhotoStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.photos()[0].id, kept.id);
    }

    #[test]
    fn clear_removes_everything_including_the_index() {
        let dir = tempdir().unwrap();

        let mut store = PhotoStore::open(dir.path()).unwrap();
        let record = store.add(&photo(40, 30), None, None).unwrap();
        store.clear().unwrap();

        assert!(store.is_empty());
        assert!(!dir.path().join(INDEX_FILE).exists());
        assert!(!dir.path().join(&record.file).exists());

        let reloaded = PhotoStore::open(dir.path()).unwrap();
        assert!(reloaded.is_empty());
    }
}
