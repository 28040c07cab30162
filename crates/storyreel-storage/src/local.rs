//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::blob::{validate_key, BlobStore};
use crate::error::StorageResult;

/// Stores blobs as files under a root directory.
///
/// URLs are `{public_base_url}/{key}`; the API serves the root directory
/// at that base.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    /// Create the store, creating `root` if needed.
    pub async fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
        validate_key(key)?;
        let path = self.root.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(key = %key, bytes = data.len(), content_type = %content_type, "Writing blob");
        tokio::fs::write(&path, data).await?;
        Ok(self.url_for(key))
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u32> {
        validate_key(prefix.trim_end_matches('/'))?;
        let dir = self.root.join(prefix.trim_end_matches('/'));

        let removed = count_files(&dir).await?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(prefix = %prefix, removed = removed, "Deleted local blobs");
        Ok(removed)
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        tokio::fs::metadata(&self.root).await?;
        Ok(())
    }
}

/// Count regular files below `dir`; a missing directory holds none.
async fn count_files(dir: &Path) -> StorageResult<u32> {
    let mut count = 0u32;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                count += 1;
            }
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{scene_asset_key, story_prefix};

    #[tokio::test]
    async fn test_put_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:8000/media/")
            .await
            .unwrap();

        let key = scene_asset_key("story-1", 0, "image.png");
        let url = store.put(&key, vec![1, 2, 3], "image/png").await.unwrap();

        assert_eq!(
            url,
            "http://localhost:8000/media/stories/story-1/scene_000/image.png"
        );
        let written = tokio::fs::read(dir.path().join(&key)).await.unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_prefix_removes_story_media() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "/media").await.unwrap();

        for index in 0..2 {
            store
                .put(&scene_asset_key("s1", index, "image.png"), vec![0], "image/png")
                .await
                .unwrap();
            store
                .put(&scene_asset_key("s1", index, "audio.mp3"), vec![0], "audio/mpeg")
                .await
                .unwrap();
        }
        store
            .put(&scene_asset_key("s2", 0, "image.png"), vec![0], "image/png")
            .await
            .unwrap();

        assert_eq!(store.delete_prefix(&story_prefix("s1")).await.unwrap(), 4);
        assert!(!dir.path().join("stories/s1").exists());
        assert!(dir.path().join("stories/s2/scene_000/image.png").exists());

        // Deleting again is a no-op.
        assert_eq!(store.delete_prefix(&story_prefix("s1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "/media").await.unwrap();
        assert!(store.put("../escape.png", vec![0], "image/png").await.is_err());
    }
}
