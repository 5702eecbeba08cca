//! File storage for source documents and line crops.

use image::GrayImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::core::errors::ArtifactError;
use crate::domain::DocumentId;

/// Reads sources and persists line crops.
pub trait ArtifactStore: Send + Sync {
    /// Raw bytes of a document's source file.
    fn read_source(&self, source_path: &str) -> Result<Vec<u8>, ArtifactError>;

    /// Persists the crop of line `line_index` of a document and returns a reference
    /// usable as `LineSegment::image_path`.
    ///
    /// References are unique per call, even for the same document and line.
    fn store_line(
        &self,
        document_id: DocumentId,
        line_index: usize,
        image: &GrayImage,
    ) -> Result<String, ArtifactError>;

    /// Deletes a crop written by [`ArtifactStore::store_line`]. Missing crops are not an error.
    fn remove_line(&self, image_path: &str) -> Result<(), ArtifactError>;
}

/// First 8 hex digits of a random UUID.
fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// [`ArtifactStore`] on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    segments_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(segments_dir: impl Into<PathBuf>) -> Self {
        Self {
            segments_dir: segments_dir.into(),
        }
    }

    pub fn segments_dir(&self) -> &Path {
        &self.segments_dir
    }

    /// Copies `source` into `uploads_dir` under a collision-free name and returns the
    /// new path.
    pub fn import_upload(uploads_dir: &Path, source: &Path) -> Result<PathBuf, ArtifactError> {
        fs::create_dir_all(uploads_dir)?;
        let filename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let target = uploads_dir.join(format!("{}_{filename}", short_token()));
        fs::copy(source, &target)?;
        debug!(source = %source.display(), target = %target.display(), "imported upload");
        Ok(target)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read_source(&self, source_path: &str) -> Result<Vec<u8>, ArtifactError> {
        Ok(fs::read(source_path)?)
    }

    fn store_line(
        &self,
        document_id: DocumentId,
        line_index: usize,
        image: &GrayImage,
    ) -> Result<String, ArtifactError> {
        fs::create_dir_all(&self.segments_dir)?;
        let path = self
            .segments_dir
            .join(format!("{document_id}_{line_index}_{}.png", short_token()));
        image.save_with_format(&path, image::ImageFormat::Png)?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn remove_line(&self, image_path: &str) -> Result<(), ArtifactError> {
        match fs::remove_file(image_path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_store_line_names_are_unique() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = FsArtifactStore::new(dir.path().join("segments"));
        let crop = GrayImage::from_pixel(60, 25, Luma([255]));

        let first = store
            .store_line(DocumentId(7), 0, &crop)
            .expect("should store");
        let second = store
            .store_line(DocumentId(7), 0, &crop)
            .expect("should store");

        assert_ne!(first, second);
        let name = Path::new(&first)
            .file_name()
            .expect("should have a name")
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("7_0_"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "7_0_".len() + 8 + ".png".len());

        let reloaded = image::open(&first).expect("should decode").to_luma8();
        assert_eq!(reloaded, crop);
    }

    #[test]
    fn test_remove_line_deletes_crop_once() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = FsArtifactStore::new(dir.path());
        let crop = GrayImage::from_pixel(60, 25, Luma([0]));
        let path = store
            .store_line(DocumentId(3), 1, &crop)
            .expect("should store");

        store.remove_line(&path).expect("should remove");
        assert!(!Path::new(&path).exists());
        store.remove_line(&path).expect("missing crop should be ignored");
    }

    #[test]
    fn test_read_source_missing_file_is_io_error() {
        let store = FsArtifactStore::new("segments");
        let err = store
            .read_source("/nonexistent/scan.png")
            .expect_err("should fail");
        assert!(matches!(err, ArtifactError::Io(_)));
    }

    #[test]
    fn test_import_upload_copies_bytes() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let source = dir.path().join("registo.png");
        fs::write(&source, b"bytes").expect("should write");

        let target = FsArtifactStore::import_upload(&dir.path().join("uploads"), &source)
            .expect("should import");
        assert!(
            target
                .file_name()
                .expect("should have a name")
                .to_string_lossy()
                .ends_with("_registo.png")
        );
        assert_eq!(fs::read(&target).expect("should read"), b"bytes");
    }
}
