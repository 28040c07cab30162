//! State store error types.

use storyreel_models::{StoryId, StoryStatus};
use thiserror::Error;

/// Result type for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur in the job state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Story not found: {0}")]
    StoryNotFound(StoryId),

    #[error("Scene {scene_index} not found in story {story_id}")]
    SceneNotFound { story_id: StoryId, scene_index: u32 },

    #[error("Scenes already added to story {0}")]
    DuplicateScenes(StoryId),

    #[error("Story {0} has no scenes to add")]
    EmptyStory(StoryId),

    #[error("Story {story_id} cannot accept scenes while {status}")]
    InvalidTransition { story_id: StoryId, status: StoryStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StateError {
    pub fn scene_not_found(story_id: &StoryId, scene_index: u32) -> Self {
        Self::SceneNotFound {
            story_id: story_id.clone(),
            scene_index,
        }
    }

    /// True for lookups of stories or scenes that do not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StateError::StoryNotFound(_) | StateError::SceneNotFound { .. }
        )
    }

    /// True if the store itself failed to persist or load state.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, StateError::Io(_) | StateError::Json(_))
    }
}
