//! Blob storage for generated scene media.
//!
//! This crate provides:
//! - The `BlobStore` trait the pipeline writes image/audio bytes through
//! - `LocalBlobStore`: files on disk, served by the API under `/media`
//! - `R2Client`: Cloudflare R2 via the S3 API
//! - Key helpers for scene assets

pub mod blob;
pub mod client;
pub mod error;
pub mod local;

pub use blob::{blob_store_from_env, scene_asset_key, story_prefix, BlobStore};
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use local::LocalBlobStore;
