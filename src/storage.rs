use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs::{File, OpenOptions};
use uuid::Uuid;

/// Request-scoped storage for uploaded images.
#[derive(Debug, Clone)]
pub struct TransientStore {
    dir: PathBuf,
}

impl TransientStore {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create upload dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates a uniquely named file. The returned guard deletes it on drop.
    pub async fn create(&self, content_type: &str) -> io::Result<(TransientImage, File)> {
        let ext = ext_from_mime(content_type).unwrap_or("bin");
        let path = self.dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok((TransientImage { path }, file))
    }

    #[cfg(test)]
    pub async fn write(&self, content_type: &str, body: &[u8]) -> io::Result<TransientImage> {
        use tokio::io::AsyncWriteExt;

        let (guard, mut file) = self.create(content_type).await?;
        file.write_all(body).await?;
        file.flush().await?;
        Ok(guard)
    }
}

/// An uploaded image on disk, removed when this value is dropped.
#[derive(Debug)]
pub struct TransientImage {
    path: PathBuf,
}

impl TransientImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for TransientImage {
    fn drop(&mut self) {
        // Blocking unlink: Drop cannot await, and a single small file is removed.
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "transient upload removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to remove transient upload")
            }
        }
    }
}

/// File extension for the accepted image types; `None` for anything else.
pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod storage_tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("image/gif"), None);
        assert_eq!(ext_from_mime("application/pdf"), None);
    }

    #[tokio::test]
    async fn file_is_removed_when_guard_drops() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TransientStore::new(tmp.path().join("uploads")).unwrap();

        let guard = store.write("image/png", b"not really a png").await.unwrap();
        let path = guard.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(guard.read().await.unwrap(), b"not really a png");

        drop(guard);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn concurrent_uploads_get_distinct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TransientStore::new(tmp.path()).unwrap();

        let a = store.write("image/jpeg", b"a").await.unwrap();
        let b = store.write("image/jpeg", b"b").await.unwrap();
        assert_ne!(a.path(), b.path());

        drop(a);
        assert!(b.path().exists());
        assert_eq!(b.read().await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn already_deleted_file_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TransientStore::new(tmp.path()).unwrap();

        let guard = store.write("image/webp", b"x").await.unwrap();
        std::fs::remove_file(guard.path()).unwrap();
        drop(guard);
    }
}
