//! Shared data models for the StoryReel backend.
//!
//! This crate provides Serde-serializable types for:
//! - Stories (generation jobs) and their lifecycle status
//! - Scenes and per-scene image/audio asset status
//! - The story structure returned by the text model
//! - Read-only status projections served to polling clients

pub mod scene;
pub mod status;
pub mod story;
pub mod structure;

// Re-export common types
pub use scene::{AssetKind, AssetStatus, AssetUpdate, Scene};
pub use status::{SceneView, StoryProgress, StoryStatusView};
pub use story::{Story, StoryId, StoryOptions, StoryStatus};
pub use structure::StoryStructure;
