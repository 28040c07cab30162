//! Read-only status projections for polling clients.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{AssetStatus, Scene, Story, StoryId, StoryStatus};

/// Aggregate progress of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoryProgress {
    pub status: StoryStatus,
    pub total_scenes: u32,
    pub completed_scenes: u32,
}

impl From<&Story> for StoryProgress {
    fn from(story: &Story) -> Self {
        Self {
            status: story.status,
            total_scenes: story.total_scenes,
            completed_scenes: story.completed_scenes,
        }
    }
}

/// One scene as seen by a polling client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneView {
    pub index: u32,
    pub text: String,
    pub image_status: AssetStatus,
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,
    pub audio_status: AssetStatus,
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_error: Option<String>,
}

impl From<Scene> for SceneView {
    fn from(scene: Scene) -> Self {
        Self {
            index: scene.scene_index,
            text: scene.text,
            image_status: scene.image_status,
            image_url: scene.image_url,
            image_error: scene.image_error,
            audio_status: scene.audio_status,
            audio_url: scene.audio_url,
            audio_error: scene.audio_error,
        }
    }
}

/// Full status of a story with its scenes in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoryStatusView {
    pub story_id: StoryId,
    pub title: String,
    pub status: StoryStatus,
    pub total_scenes: u32,
    pub completed_scenes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scenes: Vec<SceneView>,
}

impl StoryStatusView {
    pub fn new(story: Story, scenes: Vec<Scene>) -> Self {
        Self {
            story_id: story.story_id,
            title: story.title,
            status: story.status,
            total_scenes: story.total_scenes,
            completed_scenes: story.completed_scenes,
            error_message: story.error_message,
            created_at: story.created_at,
            scenes: scenes.into_iter().map(SceneView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetKind, AssetUpdate, StoryOptions};

    #[test]
    fn test_view_keeps_scene_order_and_urls() {
        let story = Story::new("Tide Pools", StoryOptions::default());
        let mut first = Scene::new(&story.story_id, 0, "first");
        first.apply(AssetKind::Image, AssetUpdate::completed("/media/0.png"));
        let second = Scene::new(&story.story_id, 1, "second");

        let view = StoryStatusView::new(story, vec![first, second]);
        assert_eq!(view.scenes.len(), 2);
        assert_eq!(view.scenes[0].index, 0);
        assert_eq!(view.scenes[0].image_url.as_deref(), Some("/media/0.png"));
        assert_eq!(view.scenes[1].text, "second");
    }

    #[test]
    fn test_scene_view_serializes_null_urls() {
        let view = SceneView::from(Scene::new(&StoryId::from("s"), 0, "text"));
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["image_url"].is_null());
        assert_eq!(json["audio_status"], "pending");
        assert!(json.get("image_error").is_none());
    }
}
