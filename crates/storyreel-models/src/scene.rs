//! Scene and scene asset models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::StoryId;

/// Which generated asset of a scene an update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Audio,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Audio => "audio",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of one generated asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Processing => "processing",
            AssetStatus::Completed => "completed",
            AssetStatus::Failed => "failed",
        }
    }

    /// Completed or failed. Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Completed | AssetStatus::Failed)
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status transition for one asset.
///
/// A URL only travels with `Completed`, which keeps the url/status pairing
/// of a scene consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetUpdate {
    Processing,
    Completed { url: String },
    Failed { reason: String },
}

impl AssetUpdate {
    pub fn status(&self) -> AssetStatus {
        match self {
            AssetUpdate::Processing => AssetStatus::Processing,
            AssetUpdate::Completed { .. } => AssetStatus::Completed,
            AssetUpdate::Failed { .. } => AssetStatus::Failed,
        }
    }

    pub fn completed(url: impl Into<String>) -> Self {
        Self::Completed { url: url.into() }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// One ordered segment of a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// `{story_id}:{scene_index}`
    pub scene_id: String,
    /// Owning story
    pub story_id: StoryId,
    /// 0-based position in the story
    pub scene_index: u32,
    /// Narration/display text
    pub text: String,

    #[serde(default)]
    pub image_status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,

    #[serde(default)]
    pub audio_status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_error: Option<String>,
}

impl Scene {
    /// Create a scene with both assets pending.
    pub fn new(story_id: &StoryId, scene_index: u32, text: impl Into<String>) -> Self {
        Self {
            scene_id: format!("{}:{}", story_id, scene_index),
            story_id: story_id.clone(),
            scene_index,
            text: text.into(),
            image_status: AssetStatus::Pending,
            image_url: None,
            image_error: None,
            audio_status: AssetStatus::Pending,
            audio_url: None,
            audio_error: None,
        }
    }

    pub fn asset_status(&self, kind: AssetKind) -> AssetStatus {
        match kind {
            AssetKind::Image => self.image_status,
            AssetKind::Audio => self.audio_status,
        }
    }

    pub fn asset_url(&self, kind: AssetKind) -> Option<&str> {
        match kind {
            AssetKind::Image => self.image_url.as_deref(),
            AssetKind::Audio => self.audio_url.as_deref(),
        }
    }

    /// Both assets reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.image_status.is_terminal() && self.audio_status.is_terminal()
    }

    /// Apply a transition to one asset.
    ///
    /// Returns `false` when the update was ignored: the asset is already
    /// terminal, or it is already in the requested non-terminal status.
    pub fn apply(&mut self, kind: AssetKind, update: AssetUpdate) -> bool {
        let (status, url, error) = match kind {
            AssetKind::Image => (
                &mut self.image_status,
                &mut self.image_url,
                &mut self.image_error,
            ),
            AssetKind::Audio => (
                &mut self.audio_status,
                &mut self.audio_url,
                &mut self.audio_error,
            ),
        };

        if status.is_terminal() || *status == update.status() {
            return false;
        }

        *status = update.status();
        match update {
            AssetUpdate::Processing => {}
            AssetUpdate::Completed { url: new_url } => {
                *url = Some(new_url);
                *error = None;
            }
            AssetUpdate::Failed { reason } => {
                *url = None;
                *error = Some(reason);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Scene {
        Scene::new(&StoryId::from("story-1"), 2, "Once upon a time")
    }

    #[test]
    fn test_new_scene_is_pending() {
        let scene = scene();
        assert_eq!(scene.scene_id, "story-1:2");
        assert_eq!(scene.image_status, AssetStatus::Pending);
        assert_eq!(scene.audio_status, AssetStatus::Pending);
        assert!(!scene.is_terminal());
    }

    #[test]
    fn test_completed_sets_url() {
        let mut scene = scene();
        assert!(scene.apply(AssetKind::Image, AssetUpdate::Processing));
        assert!(scene.apply(AssetKind::Image, AssetUpdate::completed("/media/a.png")));
        assert_eq!(scene.image_status, AssetStatus::Completed);
        assert_eq!(scene.asset_url(AssetKind::Image), Some("/media/a.png"));
        assert_eq!(scene.audio_status, AssetStatus::Pending);
        assert!(scene.audio_url.is_none());
    }

    #[test]
    fn test_terminal_status_never_changes() {
        let mut scene = scene();
        assert!(scene.apply(AssetKind::Audio, AssetUpdate::failed("timeout")));
        assert!(!scene.apply(AssetKind::Audio, AssetUpdate::completed("/media/a.mp3")));
        assert!(!scene.apply(AssetKind::Audio, AssetUpdate::Processing));
        assert_eq!(scene.audio_status, AssetStatus::Failed);
        assert!(scene.audio_url.is_none());
        assert_eq!(scene.audio_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_repeated_processing_is_ignored() {
        let mut scene = scene();
        assert!(scene.apply(AssetKind::Image, AssetUpdate::Processing));
        assert!(!scene.apply(AssetKind::Image, AssetUpdate::Processing));
    }

    #[test]
    fn test_scene_terminal_needs_both_assets() {
        let mut scene = scene();
        scene.apply(AssetKind::Image, AssetUpdate::completed("/media/a.png"));
        assert!(!scene.is_terminal());
        scene.apply(AssetKind::Audio, AssetUpdate::failed("quota"));
        assert!(scene.is_terminal());
    }

    #[test]
    fn test_update_serializes_with_status_tag() {
        let json = serde_json::to_value(AssetUpdate::completed("u")).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["url"], "u");
    }
}
