//! Blob store abstraction and scene asset keys.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::client::R2Client;
use crate::error::{StorageError, StorageResult};
use crate::local::LocalBlobStore;

/// Destination for generated media bytes.
///
/// Writes are assumed reliable and are not retried by callers; a failed
/// `put` is final for that asset.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key` and return a URL clients can fetch it from.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Delete every object under `prefix`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u32>;

    /// Check the backend is reachable.
    async fn check_connectivity(&self) -> StorageResult<()>;
}

/// Key prefix holding all media of one story.
pub fn story_prefix(story_id: &str) -> String {
    format!("stories/{}/", story_id)
}

/// Key of one scene asset, e.g. `stories/<id>/scene_002/image.png`.
pub fn scene_asset_key(story_id: &str, scene_index: u32, file_name: &str) -> String {
    format!("{}scene_{:03}/{}", story_prefix(story_id), scene_index, file_name)
}

/// Reject keys that could escape the store root.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part == ".." || part == ".")
    {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Build the blob store selected by `STORAGE_BACKEND` (`local` or `r2`).
///
/// `local` reads `MEDIA_DIR` (default `./data/media`) and
/// `MEDIA_PUBLIC_BASE_URL` (default `/media`).
pub async fn blob_store_from_env() -> StorageResult<Arc<dyn BlobStore>> {
    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string());

    match backend.to_lowercase().as_str() {
        "local" => {
            let root = std::env::var("MEDIA_DIR").unwrap_or_else(|_| "./data/media".to_string());
            let base_url =
                std::env::var("MEDIA_PUBLIC_BASE_URL").unwrap_or_else(|_| "/media".to_string());
            info!(root = %root, base_url = %base_url, "Using local blob store");
            Ok(Arc::new(LocalBlobStore::new(root, base_url).await?))
        }
        "r2" => {
            info!("Using R2 blob store");
            Ok(Arc::new(R2Client::from_env().await?))
        }
        other => Err(StorageError::config_error(format!(
            "Unknown STORAGE_BACKEND '{}', expected 'local' or 'r2'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_asset_key_layout() {
        assert_eq!(
            scene_asset_key("abc", 2, "image.png"),
            "stories/abc/scene_002/image.png"
        );
        assert!(scene_asset_key("abc", 2, "audio.mp3").starts_with(&story_prefix("abc")));
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("stories/abc/scene_000/image.png").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("stories/../../etc").is_err());
        assert!(validate_key("stories\\abc").is_err());
    }
}
