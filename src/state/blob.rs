//! Blob storage for photos attached to sources, reports and discussions
//!
//! Uploaded files are addressed by an opaque URI that gets stored in the
//! record. Nothing downstream inspects or rewrites these URIs.

use async_trait::async_trait;
use chrono::Utc;
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{fs, task};
use tracing::{debug, info};

/// Longest edge of an uploaded photo
const MAX_PHOTO_EDGE: u32 = 1280;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not process photo: {0}")]
    Image(#[from] image::ImageError),
    #[error("photo task failed: {0}")]
    Task(#[from] task::JoinError),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return a URI that can be put into a record
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, BlobError>;
}

/// Blob store writing into a local directory and handing out `file://` URIs
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, BlobError> {
        let dir = self.root.join("images");
        fs::create_dir_all(&dir).await.map_err(|source| BlobError::Io {
            path: dir.clone(),
            source,
        })?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let path = dir.join(format!("{}_{}.jpg", Utc::now().timestamp_millis(), &suffix[..7]));
        fs::write(&path, &bytes).await.map_err(|source| BlobError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), size = bytes.len(), "photo uploaded");
        Ok(format!("file://{}", path.display()))
    }
}

/// Load a picked photo, shrink it to the upload size and re-encode as JPEG
pub async fn prepare_photo(path: PathBuf) -> Result<Vec<u8>, BlobError> {
    // Spawn blocking because decoding is CPU-intensive
    task::spawn_blocking(move || prepare_photo_blocking(&path)).await?
}

fn prepare_photo_blocking(path: &Path) -> Result<Vec<u8>, BlobError> {
    let img = image::open(path)?;

    let img = if img.width() > MAX_PHOTO_EDGE || img.height() > MAX_PHOTO_EDGE {
        img.resize(MAX_PHOTO_EDGE, MAX_PHOTO_EDGE, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let img = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;

    debug!(path = %path.display(), width = img.width(), height = img.height(), "photo prepared");
    Ok(bytes)
}

/// Prepare and upload every photo, failing on the first error
pub async fn upload_photos(
    store: &dyn BlobStore,
    photos: Vec<PathBuf>,
) -> Result<Vec<String>, BlobError> {
    let mut uris = Vec::with_capacity(photos.len());
    for photo in photos {
        let bytes = prepare_photo(photo).await?;
        uris.push(store.upload(bytes).await?);
    }
    Ok(uris)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn test_upload_returns_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let uri = store.upload(vec![1, 2, 3]).await.unwrap();

        let path = uri.strip_prefix("file://").unwrap();
        assert!(path.starts_with(dir.path().to_str().unwrap()));
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_uploads_get_distinct_uris() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let first = store.upload(vec![1]).await.unwrap();
        let second = store.upload(vec![2]).await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_large_photo_is_downscaled() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("wide.png");
        RgbaImage::from_pixel(2560, 640, Rgba([20, 90, 200, 128]))
            .save(&source)
            .unwrap();

        let bytes = prepare_photo(source).await.unwrap();

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.width(), MAX_PHOTO_EDGE);
        assert_eq!(decoded.height(), 320);
    }

    #[tokio::test]
    async fn test_missing_photo_fails() {
        let dir = tempfile::tempdir().unwrap();

        let result = prepare_photo(dir.path().join("nope.jpg")).await;

        assert!(matches!(result, Err(BlobError::Image(_))));
    }
}
