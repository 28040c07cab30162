//! Read-only status projections for polling clients.

use std::sync::Arc;

use storyreel_models::{SceneView, StoryId, StoryStatusView};

use crate::error::StateResult;
use crate::store::JobStore;

/// Polling view over the job store. Never writes.
#[derive(Clone)]
pub struct StatusQuery {
    store: Arc<JobStore>,
}

impl StatusQuery {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Story status with every scene, taken from one consistent snapshot.
    pub async fn get_status(&self, story_id: &StoryId) -> StateResult<StoryStatusView> {
        let record = self.store.snapshot(story_id).await?;
        Ok(StoryStatusView::new(record.story, record.scenes))
    }

    /// Detail of a single scene.
    pub async fn get_scene(&self, story_id: &StoryId, scene_index: u32) -> StateResult<SceneView> {
        let scene = self.store.get_scene(story_id, scene_index).await?;
        Ok(SceneView::from(scene))
    }
}
