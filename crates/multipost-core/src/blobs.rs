//! Temporary image spool.
//!
//! Uploaded images become [`ImageHandle`]s: scoped resources that remove
//! their backing file when dropped, so every exit path (immediate send,
//! scheduler success, scheduler failure) releases them.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::Result;

/// Writes uploaded images into a spool directory and hands out scoped
/// handles.
#[derive(Clone, Debug)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub async fn store(&self, bytes: &[u8]) -> Result<ImageHandle> {
        let path = self.dir.join(format!("{}.jpg", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "spooled uploaded image");
        Ok(ImageHandle { path })
    }
}

/// A scoped handle to a spooled image. The file is removed on drop;
/// removal failures are logged, never propagated.
#[derive(Debug)]
pub struct ImageHandle {
    path: PathBuf,
}

impl ImageHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file still resolves to live content.
    pub fn is_live(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released spooled image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to release spooled image"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_image_is_live_until_dropped() {
        let store = BlobStore::new(std::env::temp_dir().join("multipost-blob-tests")).unwrap();
        let handle = store.store(b"jpeg bytes").await.unwrap();
        let path = handle.path().to_path_buf();

        assert!(handle.is_live());
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");

        drop(handle);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropping_a_handle_with_a_missing_file_is_quiet() {
        let store = BlobStore::new(std::env::temp_dir().join("multipost-blob-tests")).unwrap();
        let handle = store.store(b"x").await.unwrap();
        std::fs::remove_file(handle.path()).unwrap();
        assert!(!handle.is_live());
        drop(handle); // must not panic
    }
}
