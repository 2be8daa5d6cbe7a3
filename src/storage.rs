//! On-disk storage for accepted uploads under generated, collision-free names

use crate::error::{Error, Result};
use crate::models::UploadedAsset;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Source of unique tokens used as stored file stems.
pub trait IdGenerator: Send + Sync {
    /// Produce the next token. Must never repeat for the lifetime of the store.
    fn next_id(&self) -> String;
}

/// Random v4 UUID tokens
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `{prefix}{counter}` tokens, useful in tests.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    /// Start counting from zero with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{n:08}", self.prefix)
    }
}

/// Append-only store rooted at a single directory.
pub struct AssetStore {
    dir: PathBuf,
    ids: Arc<dyn IdGenerator>,
    ready: OnceCell<()>,
}

impl fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl AssetStore {
    /// Store rooted at `dir` using random UUID names
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_ids(dir, Arc::new(UuidIds))
    }

    /// Store rooted at `dir` using a custom ID generator
    pub fn with_ids(dir: impl Into<PathBuf>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            dir: dir.into(),
            ids,
            ready: OnceCell::new(),
        }
    }

    /// Directory holding stored assets
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory if it does not exist yet.
    ///
    /// Runs at most once per store; concurrent callers wait on the same
    /// initialisation and a directory created by someone else counts as success.
    pub async fn ensure_dir(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
                    Error::Storage(format!(
                        "Failed to create upload directory {}: {e}",
                        self.dir.display()
                    ))
                })?;
                tracing::debug!(dir = %self.dir.display(), "Upload directory ready");
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    /// Persist `bytes` under a fresh name carrying `extension`.
    pub async fn store(&self, extension: &str, bytes: &[u8]) -> Result<UploadedAsset> {
        self.ensure_dir().await?;

        let id = self.ids.next_id();
        let asset = UploadedAsset {
            storage_path: self.dir.join(format!("{id}{extension}")),
            id,
            extension: extension.to_string(),
        };

        // create_new: an existing name is never overwritten
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&asset.storage_path)
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "Failed to create {}: {e}",
                    asset.storage_path.display()
                ))
            })?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&asset.storage_path).await;
            return Err(Error::Storage(format!(
                "Failed to write {}: {e}",
                asset.storage_path.display()
            )));
        }

        tracing::info!(
            file = %asset.file_name(),
            bytes = bytes.len(),
            "Stored upload"
        );
        Ok(asset)
    }

    /// Remove a stored asset whose request failed after it was written.
    pub async fn discard(&self, asset: &UploadedAsset) {
        match tokio::fs::remove_file(&asset.storage_path).await {
            Ok(()) => tracing::debug!(file = %asset.file_name(), "Discarded upload"),
            Err(e) => tracing::warn!(
                file = %asset.file_name(),
                error = %e,
                "Failed to discard upload"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("uploads");
        let store = AssetStore::new(&dir);

        store.ensure_dir().await.unwrap();
        store.ensure_dir().await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_store_uses_generated_name_and_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AssetStore::with_ids(tmp.path(), Arc::new(SequentialIds::new("img-")));

        let asset = store.store(".png", b"pixels").await.unwrap();
        assert_eq!(asset.file_name(), "img-00000000.png");
        assert_eq!(
            std::fs::read(tmp.path().join("img-00000000.png")).unwrap(),
            b"pixels"
        );
    }

    #[tokio::test]
    async fn test_never_overwrites_existing_file() {
        struct Constant;
        impl IdGenerator for Constant {
            fn next_id(&self) -> String {
                "same".to_string()
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let store = AssetStore::with_ids(tmp.path(), Arc::new(Constant));

        store.store(".gif", b"first").await.unwrap();
        let err = store.store(".gif", b"second").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(std::fs::read(tmp.path().join("same.gif")).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_discard_removes_stored_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AssetStore::with_ids(tmp.path(), Arc::new(SequentialIds::new("d-")));

        let asset = store.store(".png", b"pixels").await.unwrap();
        assert!(asset.storage_path.exists());

        store.discard(&asset).await;
        assert!(!asset.storage_path.exists());

        // A second discard only logs.
        store.discard(&asset).await;
    }

    #[tokio::test]
    async fn test_concurrent_first_use() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(AssetStore::new(tmp.path().join("uploads")));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.store(".jpg", b"x").await.map(|a| a.file_name())
            }));
        }

        let mut names = HashSet::new();
        for handle in handles {
            names.insert(handle.await.unwrap().unwrap());
        }
        assert_eq!(names.len(), 16);
    }

    #[test]
    fn test_sequential_ids_are_distinct() {
        let ids = SequentialIds::new("t");
        assert_eq!(ids.next_id(), "t00000000");
        assert_eq!(ids.next_id(), "t00000001");
    }
}
