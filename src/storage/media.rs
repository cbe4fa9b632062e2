//! Content-addressed media storage
//!
//! Uploaded files are named by the SHA-256 of their content, so identical
//! uploads share one file on disk. Thumbnails live under `thumbs/`.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AppError;

const THUMBNAIL_DIR: &str = "thumbs";

/// Result of storing an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Stored file name (`<sha256-hex>.<ext>`)
    pub name: String,
    /// The content was already on disk and was not rewritten
    pub deduplicated: bool,
}

/// Media storage service
///
/// Writes media into a local directory and builds public URLs for it.
pub struct MediaStorage {
    /// Directory holding stored files
    root: PathBuf,
    /// Public URL prefix, e.g. "/media"
    public_url: String,
}

impl MediaStorage {
    /// Create media storage rooted at the configured directory
    ///
    /// # Errors
    /// Returns error if the directories cannot be created
    pub fn new(config: &crate::config::MediaStorageConfig) -> Result<Self, AppError> {
        std::fs::create_dir_all(config.root.join(THUMBNAIL_DIR))?;

        Ok(Self {
            root: config.root.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Media root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store file content under its content hash
    ///
    /// # Arguments
    /// * `data` - File contents
    /// * `extension` - Canonical extension without the dot (e.g. "png")
    ///
    /// # Example
    /// ```ignore
    /// let stored = storage.store(bytes, "png").await?;
    /// // stored.name == "9f86d0...a08.png"
    /// ```
    pub async fn store(&self, data: Vec<u8>, extension: &str) -> Result<StoredMedia, AppError> {
        let digest = hex_digest(&data);
        let name = format!("{}.{}", digest, extension.to_ascii_lowercase());
        validate_name(&name)?;

        let path = self.root.join(&name);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(name = %name, "Media already stored, skipping write");
            return Ok(StoredMedia {
                name,
                deduplicated: true,
            });
        }

        let root = self.root.clone();
        tokio::task::spawn_blocking(move || write_atomically(&root, &path, &data))
            .await
            .map_err(|e| AppError::Storage(format!("media write task failed: {}", e)))??;

        tracing::info!(name = %name, "Stored media file");
        Ok(StoredMedia {
            name,
            deduplicated: false,
        })
    }

    /// Store a JPEG thumbnail for a stored file
    ///
    /// # Returns
    /// Thumbnail name relative to the media root
    pub async fn store_thumbnail(&self, name: &str, jpeg: Vec<u8>) -> Result<String, AppError> {
        let thumbnail = self.thumbnail_name(name)?;
        let path = self.root.join(&thumbnail);
        let dir = self.root.join(THUMBNAIL_DIR);

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &jpeg))
            .await
            .map_err(|e| AppError::Storage(format!("thumbnail write task failed: {}", e)))??;

        Ok(thumbnail)
    }

    /// Thumbnail name for a stored file (`thumbs/<hash>.jpg`)
    pub fn thumbnail_name(&self, name: &str) -> Result<String, AppError> {
        let (stem, _) = validate_name(name)?;
        Ok(format!("{}/{}.jpg", THUMBNAIL_DIR, stem))
    }

    /// Filesystem path of a stored file
    pub fn path(&self, name: &str) -> Result<PathBuf, AppError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Whether a stored file exists
    pub async fn exists(&self, name: &str) -> Result<bool, AppError> {
        let path = self.path(name)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    /// Whether a thumbnail exists for a stored file
    pub async fn thumbnail_exists(&self, name: &str) -> Result<bool, AppError> {
        let path = self.root.join(self.thumbnail_name(name)?);
        Ok(tokio::fs::try_exists(path).await?)
    }

    /// Delete a stored file and its thumbnail
    ///
    /// Files that are already gone are not an error.
    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        let path = self.path(name)?;
        let thumbnail = self.root.join(self.thumbnail_name(name)?);

        for path in [path, thumbnail] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(name = %name, "Deleted media file");
        Ok(())
    }

    /// Public URL of a stored file
    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_url, name)
    }

    /// Public URL of a stored file's thumbnail
    pub fn thumbnail_url(&self, name: &str) -> Option<String> {
        self.thumbnail_name(name)
            .ok()
            .map(|thumbnail| self.public_url(&thumbnail))
    }
}

fn hex_digest(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Write through a temp file in `dir`, then rename into place
fn write_atomically(dir: &Path, path: &Path, data: &[u8]) -> Result<(), AppError> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| AppError::from(e.error))?;
    Ok(())
}

/// Split a stored name into (hex stem, extension), rejecting anything else
fn validate_name(name: &str) -> Result<(&str, &str), AppError> {
    let invalid = || AppError::Storage(format!("invalid media name: {:?}", name));

    let (stem, extension) = name.split_once('.').ok_or_else(invalid)?;
    let stem_ok = stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit());
    let extension_ok = !extension.is_empty()
        && extension.len() <= 5
        && extension.bytes().all(|b| b.is_ascii_alphanumeric());

    if stem_ok && extension_ok {
        Ok((stem, extension))
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MediaStorageConfig, default_media_formats};
    use tempfile::TempDir;

    fn create_storage() -> (MediaStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = MediaStorageConfig {
            root: temp_dir.path().join("media"),
            public_url: "/media/".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            thumbnail_size: 420,
            formats: default_media_formats(),
        };
        (MediaStorage::new(&config).unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn store_names_file_by_content_hash() {
        let (storage, _temp_dir) = create_storage();

        let stored = storage.store(b"hello".to_vec(), "PNG").await.unwrap();
        assert_eq!(
            stored.name,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824.png"
        );
        assert!(!stored.deduplicated);
        assert!(storage.exists(&stored.name).await.unwrap());
        assert_eq!(
            std::fs::read(storage.path(&stored.name).unwrap()).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn store_deduplicates_identical_content() {
        let (storage, _temp_dir) = create_storage();

        let first = storage.store(b"same".to_vec(), "gif").await.unwrap();
        let second = storage.store(b"same".to_vec(), "gif").await.unwrap();

        assert_eq!(first.name, second.name);
        assert!(second.deduplicated);
    }

    #[tokio::test]
    async fn delete_removes_file_and_thumbnail() {
        let (storage, _temp_dir) = create_storage();

        let stored = storage.store(b"image".to_vec(), "jpg").await.unwrap();
        let thumbnail = storage
            .store_thumbnail(&stored.name, b"thumb".to_vec())
            .await
            .unwrap();
        assert!(thumbnail.starts_with("thumbs/"));
        assert!(storage.thumbnail_exists(&stored.name).await.unwrap());

        storage.delete(&stored.name).await.unwrap();
        assert!(!storage.exists(&stored.name).await.unwrap());
        assert!(!storage.thumbnail_exists(&stored.name).await.unwrap());

        // Second delete is a no-op
        storage.delete(&stored.name).await.unwrap();
    }

    #[tokio::test]
    async fn public_urls_use_trimmed_prefix() {
        let (storage, _temp_dir) = create_storage();
        let name = format!("{}.png", "a".repeat(64));

        assert_eq!(storage.public_url(&name), format!("/media/{}", name));
        assert_eq!(
            storage.thumbnail_url(&name),
            Some(format!("/media/thumbs/{}.jpg", "a".repeat(64)))
        );
    }

    #[test]
    fn path_rejects_traversal_and_foreign_names() {
        let (storage, _temp_dir) = create_storage();

        assert!(storage.path("../etc/passwd").is_err());
        assert!(storage.path("abc.png").is_err());
        assert!(storage.path(&format!("{}.p/ng", "a".repeat(64))).is_err());
        assert!(storage.path(&format!("{}.png", "a".repeat(64))).is_ok());
    }
}
