//! Concurrency-safe job state store.
//!
//! Each story lives behind its own `RwLock`. Mutations clone the record,
//! apply the change, persist the clone and only then commit it, all under
//! the story's write lock. A failed write therefore leaves the visible
//! record untouched. Reads take the read lock and return owned snapshots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use storyreel_models::{
    AssetKind, AssetUpdate, Scene, Story, StoryId, StoryOptions, StoryProgress, StoryStatus,
};

use crate::error::{StateError, StateResult};
use crate::persistence::{StoryFiles, StoryRecord};

struct StoryEntry {
    record: StoryRecord,
    /// Set by `delete_story` so writers still holding the entry back off.
    deleted: bool,
}

type SharedEntry = Arc<RwLock<StoryEntry>>;

/// Failure reason recorded for work cut off by a restart.
pub const INTERRUPTED_REASON: &str = "interrupted by restart";

/// Store of stories and their scenes.
pub struct JobStore {
    stories: RwLock<HashMap<StoryId, SharedEntry>>,
    files: Option<StoryFiles>,
}

impl JobStore {
    /// Create a store that keeps state in memory only.
    pub fn in_memory() -> Self {
        Self {
            stories: RwLock::new(HashMap::new()),
            files: None,
        }
    }

    /// Open a store persisted under `dir`, reloading existing stories.
    ///
    /// Stories still pending or processing were interrupted by the restart:
    /// their unfinished work is failed with [`INTERRUPTED_REASON`] and
    /// written back before the store is returned.
    pub async fn open(dir: impl Into<PathBuf>) -> StateResult<Self> {
        let files = StoryFiles::open(dir).await?;
        let mut records = files.load_all().await?;

        for record in &mut records {
            if record.fail_interrupted(INTERRUPTED_REASON) {
                files.write(record).await?;
                warn!(
                    story_id = %record.story.story_id,
                    status = %record.story.status,
                    "Closed out story interrupted by restart"
                );
            }
        }

        let stories = records
            .into_iter()
            .map(|record| {
                let id = record.story.story_id.clone();
                let entry = StoryEntry {
                    record,
                    deleted: false,
                };
                (id, Arc::new(RwLock::new(entry)))
            })
            .collect();

        Ok(Self {
            stories: RwLock::new(stories),
            files: Some(files),
        })
    }

    /// Number of stories currently held.
    pub async fn len(&self) -> usize {
        self.stories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Check that the backing storage is reachable.
    pub async fn check_health(&self) -> StateResult<()> {
        match &self.files {
            Some(files) => files.check().await,
            None => Ok(()),
        }
    }

    async fn entry(&self, story_id: &StoryId) -> StateResult<SharedEntry> {
        self.stories
            .read()
            .await
            .get(story_id)
            .cloned()
            .ok_or_else(|| StateError::StoryNotFound(story_id.clone()))
    }

    async fn persist(&self, record: &StoryRecord) -> StateResult<()> {
        match &self.files {
            Some(files) => files.write(record).await,
            None => Ok(()),
        }
    }

    /// Read-modify-write one story under its write lock.
    ///
    /// Nothing is persisted when `apply` leaves the record unchanged.
    async fn mutate<T>(
        &self,
        story_id: &StoryId,
        apply: impl FnOnce(&mut StoryRecord) -> StateResult<T>,
    ) -> StateResult<T> {
        let entry = self.entry(story_id).await?;
        let mut guard = entry.write().await;
        if guard.deleted {
            return Err(StateError::StoryNotFound(story_id.clone()));
        }

        let mut next = guard.record.clone();
        let out = apply(&mut next)?;

        if next != guard.record {
            self.persist(&next).await?;
            guard.record = next;
        }
        Ok(out)
    }

    async fn read<T>(
        &self,
        story_id: &StoryId,
        view: impl FnOnce(&StoryRecord) -> StateResult<T>,
    ) -> StateResult<T> {
        let entry = self.entry(story_id).await?;
        let guard = entry.read().await;
        if guard.deleted {
            return Err(StateError::StoryNotFound(story_id.clone()));
        }
        view(&guard.record)
    }

    /// Create a pending story and return its ID.
    pub async fn create_story(
        &self,
        title_placeholder: impl Into<String>,
        options: StoryOptions,
    ) -> StateResult<StoryId> {
        let record = StoryRecord::new(Story::new(title_placeholder, options));
        let story_id = record.story.story_id.clone();

        self.persist(&record).await?;
        let entry = StoryEntry {
            record,
            deleted: false,
        };
        self.stories
            .write()
            .await
            .insert(story_id.clone(), Arc::new(RwLock::new(entry)));

        info!(story_id = %story_id, "Created story");
        Ok(story_id)
    }

    /// Set the story title once the structure is known.
    pub async fn set_title(&self, story_id: &StoryId, title: impl Into<String>) -> StateResult<()> {
        let title = title.into();
        self.mutate(story_id, |record| {
            if record.story.title != title {
                record.story.title = title;
                record.story.updated_at = Utc::now();
            }
            Ok(())
        })
        .await
    }

    /// Insert the ordered scene rows, all `pending/pending`.
    ///
    /// Moves the story from `pending` to `processing`. Allowed exactly once
    /// per story.
    pub async fn add_scenes(
        &self,
        story_id: &StoryId,
        ordered_texts: &[String],
    ) -> StateResult<()> {
        self.mutate(story_id, |record| {
            if !record.scenes.is_empty() {
                return Err(StateError::DuplicateScenes(story_id.clone()));
            }
            if record.story.status != StoryStatus::Pending {
                return Err(StateError::InvalidTransition {
                    story_id: story_id.clone(),
                    status: record.story.status,
                });
            }
            if ordered_texts.is_empty() {
                return Err(StateError::EmptyStory(story_id.clone()));
            }

            record.scenes = ordered_texts
                .iter()
                .enumerate()
                .map(|(index, text)| Scene::new(story_id, index as u32, text.as_str()))
                .collect();
            record.story.total_scenes = record.scenes.len() as u32;
            record.story.completed_scenes = 0;
            record.story.status = StoryStatus::Processing;
            record.story.updated_at = Utc::now();
            Ok(())
        })
        .await?;

        info!(story_id = %story_id, scenes = ordered_texts.len(), "Added scenes");
        Ok(())
    }

    /// Apply a status transition to one scene asset.
    ///
    /// Returns `false` if the update was ignored because the asset is
    /// already terminal. A terminal transition recounts completed scenes
    /// and completes the story once every scene is fully terminal.
    pub async fn update_scene_asset(
        &self,
        story_id: &StoryId,
        scene_index: u32,
        kind: AssetKind,
        update: AssetUpdate,
    ) -> StateResult<bool> {
        let status = update.status();
        let applied = self
            .mutate(story_id, |record| {
                let scene = record
                    .scenes
                    .get_mut(scene_index as usize)
                    .ok_or_else(|| StateError::scene_not_found(story_id, scene_index))?;

                if !scene.apply(kind, update) {
                    return Ok(false);
                }

                let now = Utc::now();
                record.story.updated_at = now;

                if status.is_terminal() {
                    record.settle(now);
                }
                Ok(true)
            })
            .await?;

        if applied {
            debug!(
                story_id = %story_id,
                scene_index = scene_index,
                asset = %kind,
                status = %status,
                "Scene asset updated"
            );
        } else {
            warn!(
                story_id = %story_id,
                scene_index = scene_index,
                asset = %kind,
                status = %status,
                "Ignored scene asset update"
            );
        }
        Ok(applied)
    }

    /// Mark a pending story as failed.
    ///
    /// Returns `false` if the story already left `pending`.
    pub async fn fail_story(
        &self,
        story_id: &StoryId,
        reason: impl Into<String>,
    ) -> StateResult<bool> {
        let reason = reason.into();
        self.mutate(story_id, |record| {
            if record.story.status != StoryStatus::Pending {
                return Ok(false);
            }
            record.story.fail(reason);
            Ok(true)
        })
        .await
    }

    /// Status and scene counters of a story.
    pub async fn get_story_status(&self, story_id: &StoryId) -> StateResult<StoryProgress> {
        self.read(story_id, |record| Ok(StoryProgress::from(&record.story)))
            .await
    }

    /// Snapshot of the story row.
    pub async fn get_story(&self, story_id: &StoryId) -> StateResult<Story> {
        self.read(story_id, |record| Ok(record.story.clone())).await
    }

    /// All scenes of a story in `scene_index` order.
    pub async fn get_all_scenes(&self, story_id: &StoryId) -> StateResult<Vec<Scene>> {
        self.read(story_id, |record| Ok(record.scenes.clone())).await
    }

    /// One scene of a story.
    pub async fn get_scene(&self, story_id: &StoryId, scene_index: u32) -> StateResult<Scene> {
        self.read(story_id, |record| {
            record
                .scenes
                .get(scene_index as usize)
                .cloned()
                .ok_or_else(|| StateError::scene_not_found(story_id, scene_index))
        })
        .await
    }

    /// Story row and scenes taken under a single read lock.
    pub async fn snapshot(&self, story_id: &StoryId) -> StateResult<StoryRecord> {
        self.read(story_id, |record| Ok(record.clone())).await
    }

    /// Remove a story and its scenes.
    ///
    /// Writers that still hold the story see `StoryNotFound` afterwards.
    pub async fn delete_story(&self, story_id: &StoryId) -> StateResult<()> {
        let entry = self.entry(story_id).await?;
        let mut guard = entry.write().await;
        if guard.deleted {
            return Err(StateError::StoryNotFound(story_id.clone()));
        }

        if let Some(files) = &self.files {
            files.remove(story_id).await?;
        }
        guard.deleted = true;
        self.stories.write().await.remove(story_id);

        info!(story_id = %story_id, "Deleted story");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_models::AssetStatus;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn story_with_scenes(store: &JobStore, scenes: &[&str]) -> StoryId {
        let id = store
            .create_story("Untitled", StoryOptions::default())
            .await
            .unwrap();
        store.add_scenes(&id, &texts(scenes)).await.unwrap();
        id
    }

    async fn finish(store: &JobStore, id: &StoryId, index: u32) {
        store
            .update_scene_asset(id, index, AssetKind::Image, AssetUpdate::completed("i"))
            .await
            .unwrap();
        store
            .update_scene_asset(id, index, AssetKind::Audio, AssetUpdate::completed("a"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_story_is_pending() {
        let store = JobStore::in_memory();
        let id = store
            .create_story("Untitled", StoryOptions::default())
            .await
            .unwrap();

        let progress = store.get_story_status(&id).await.unwrap();
        assert_eq!(progress.status, StoryStatus::Pending);
        assert_eq!(progress.total_scenes, 0);
        assert!(store.get_all_scenes(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scenes_keep_insertion_order() {
        let store = JobStore::in_memory();
        let id = story_with_scenes(&store, &["zebra", "apple", "mango"]).await;

        let scenes = store.get_all_scenes(&id).await.unwrap();
        let order: Vec<_> = scenes.iter().map(|s| (s.scene_index, s.text.as_str())).collect();
        assert_eq!(order, vec![(0, "zebra"), (1, "apple"), (2, "mango")]);
        assert!(scenes.iter().all(|s| {
            s.image_status == AssetStatus::Pending && s.audio_status == AssetStatus::Pending
        }));

        let progress = store.get_story_status(&id).await.unwrap();
        assert_eq!(progress.status, StoryStatus::Processing);
        assert_eq!(progress.total_scenes, 3);
    }

    #[tokio::test]
    async fn test_add_scenes_twice_is_rejected() {
        let store = JobStore::in_memory();
        let id = story_with_scenes(&store, &["one", "two"]).await;

        let err = store.add_scenes(&id, &texts(&["other"])).await.unwrap_err();
        assert!(matches!(err, StateError::DuplicateScenes(_)));

        let scenes = store.get_all_scenes(&id).await.unwrap();
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].text, "one");
    }

    #[tokio::test]
    async fn test_add_empty_scenes_is_rejected() {
        let store = JobStore::in_memory();
        let id = store
            .create_story("Untitled", StoryOptions::default())
            .await
            .unwrap();

        let err = store.add_scenes(&id, &[]).await.unwrap_err();
        assert!(matches!(err, StateError::EmptyStory(_)));
        assert_eq!(
            store.get_story_status(&id).await.unwrap().status,
            StoryStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_unknown_story_is_not_found() {
        let store = JobStore::in_memory();
        let missing = StoryId::from("missing");

        assert!(store.get_story_status(&missing).await.unwrap_err().is_not_found());
        assert!(store.get_all_scenes(&missing).await.unwrap_err().is_not_found());
        let err = store
            .update_scene_asset(&missing, 0, AssetKind::Image, AssetUpdate::Processing)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_scene_is_not_found() {
        let store = JobStore::in_memory();
        let id = story_with_scenes(&store, &["only"]).await;

        let err = store.get_scene(&id, 4).await.unwrap_err();
        assert!(matches!(err, StateError::SceneNotFound { scene_index: 4, .. }));
    }

    #[tokio::test]
    async fn test_terminal_asset_never_regresses() {
        let store = JobStore::in_memory();
        let id = story_with_scenes(&store, &["one"]).await;

        assert!(store
            .update_scene_asset(&id, 0, AssetKind::Image, AssetUpdate::failed("boom"))
            .await
            .unwrap());
        assert!(!store
            .update_scene_asset(&id, 0, AssetKind::Image, AssetUpdate::completed("late"))
            .await
            .unwrap());
        assert!(!store
            .update_scene_asset(&id, 0, AssetKind::Image, AssetUpdate::Processing)
            .await
            .unwrap());

        let scene = store.get_scene(&id, 0).await.unwrap();
        assert_eq!(scene.image_status, AssetStatus::Failed);
        assert!(scene.image_url.is_none());
    }

    #[tokio::test]
    async fn test_url_present_only_when_completed() {
        let store = JobStore::in_memory();
        let id = story_with_scenes(&store, &["one"]).await;

        store
            .update_scene_asset(&id, 0, AssetKind::Audio, AssetUpdate::Processing)
            .await
            .unwrap();
        let scene = store.get_scene(&id, 0).await.unwrap();
        assert!(scene.audio_url.is_none());

        store
            .update_scene_asset(&id, 0, AssetKind::Audio, AssetUpdate::completed("/media/a.mp3"))
            .await
            .unwrap();
        let scene = store.get_scene(&id, 0).await.unwrap();
        assert_eq!(scene.audio_status, AssetStatus::Completed);
        assert_eq!(scene.audio_url.as_deref(), Some("/media/a.mp3"));
        assert!(scene.image_url.is_none());
    }

    #[tokio::test]
    async fn test_story_completes_when_all_scenes_terminal() {
        let store = JobStore::in_memory();
        let id = story_with_scenes(&store, &["one", "two"]).await;

        finish(&store, &id, 0).await;
        let progress = store.get_story_status(&id).await.unwrap();
        assert_eq!(progress.status, StoryStatus::Processing);
        assert_eq!(progress.completed_scenes, 1);

        store
            .update_scene_asset(&id, 1, AssetKind::Image, AssetUpdate::failed("quota"))
            .await
            .unwrap();
        store
            .update_scene_asset(&id, 1, AssetKind::Audio, AssetUpdate::completed("a"))
            .await
            .unwrap();

        let story = store.get_story(&id).await.unwrap();
        assert_eq!(story.status, StoryStatus::Completed);
        assert_eq!(story.completed_scenes, story.total_scenes);
        assert!(story.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_updates_converge() {
        let store = Arc::new(JobStore::in_memory());
        let scenes: Vec<String> = (0..8).map(|i| format!("scene {}", i)).collect();
        let id = store
            .create_story("Untitled", StoryOptions::default())
            .await
            .unwrap();
        store.add_scenes(&id, &scenes).await.unwrap();

        let mut handles = Vec::new();
        for index in 0..8u32 {
            for kind in [AssetKind::Image, AssetKind::Audio] {
                let store = Arc::clone(&store);
                let id = id.clone();
                handles.push(tokio::spawn(async move {
                    store
                        .update_scene_asset(&id, index, kind, AssetUpdate::completed("u"))
                        .await
                        .unwrap();
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let progress = store.get_story_status(&id).await.unwrap();
        assert_eq!(progress.status, StoryStatus::Completed);
        assert_eq!(progress.completed_scenes, 8);
    }

    #[tokio::test]
    async fn test_fail_story_only_from_pending() {
        let store = JobStore::in_memory();
        let pending = store
            .create_story("Untitled", StoryOptions::default())
            .await
            .unwrap();
        assert!(store.fail_story(&pending, "no structure").await.unwrap());
        let story = store.get_story(&pending).await.unwrap();
        assert_eq!(story.status, StoryStatus::Failed);
        assert_eq!(story.error_message.as_deref(), Some("no structure"));

        let processing = story_with_scenes(&store, &["one"]).await;
        assert!(!store.fail_story(&processing, "late").await.unwrap());
        assert_eq!(
            store.get_story_status(&processing).await.unwrap().status,
            StoryStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_failed_story_rejects_scenes() {
        let store = JobStore::in_memory();
        let id = store
            .create_story("Untitled", StoryOptions::default())
            .await
            .unwrap();
        store.fail_story(&id, "no structure").await.unwrap();

        let err = store.add_scenes(&id, &texts(&["one"])).await.unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_writes_after_delete_are_not_found() {
        let store = JobStore::in_memory();
        let id = story_with_scenes(&store, &["one"]).await;

        store.delete_story(&id).await.unwrap();
        let err = store
            .update_scene_asset(&id, 0, AssetKind::Image, AssetUpdate::completed("u"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_persisted_store_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = JobStore::open(dir.path()).await.unwrap();
            let id = story_with_scenes(&store, &["one", "two"]).await;
            store.set_title(&id, "The Harbor").await.unwrap();
            finish(&store, &id, 0).await;
            finish(&store, &id, 1).await;
            id
        };

        let reopened = JobStore::open(dir.path()).await.unwrap();
        let story = reopened.get_story(&id).await.unwrap();
        assert_eq!(story.title, "The Harbor");
        assert_eq!(story.status, StoryStatus::Completed);
        assert_eq!(story.completed_scenes, 2);

        let scenes = reopened.get_all_scenes(&id).await.unwrap();
        assert_eq!(scenes[1].image_url.as_deref(), Some("i"));
        assert_eq!(scenes[0].audio_url.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_reopen_closes_out_interrupted_stories() {
        let dir = tempfile::tempdir().unwrap();
        let (processing, pending, done) = {
            let store = JobStore::open(dir.path()).await.unwrap();
            let processing = story_with_scenes(&store, &["a", "b"]).await;
            finish(&store, &processing, 0).await;
            store
                .update_scene_asset(&processing, 1, AssetKind::Image, AssetUpdate::Processing)
                .await
                .unwrap();
            let pending = store
                .create_story("Untitled", StoryOptions::default())
                .await
                .unwrap();
            let done = story_with_scenes(&store, &["c"]).await;
            finish(&store, &done, 0).await;
            (processing, pending, done)
        };

        let reopened = JobStore::open(dir.path()).await.unwrap();
        let story = reopened.get_story(&processing).await.unwrap();
        assert_eq!(story.status, StoryStatus::Completed);
        assert_eq!(story.completed_scenes, 2);
        assert!(story.completed_at.is_some());

        let scenes = reopened.get_all_scenes(&processing).await.unwrap();
        assert_eq!(scenes[0].image_status, AssetStatus::Completed);
        assert_eq!(scenes[0].image_url.as_deref(), Some("i"));
        assert_eq!(scenes[1].image_status, AssetStatus::Failed);
        assert_eq!(scenes[1].audio_status, AssetStatus::Failed);
        assert_eq!(scenes[1].image_error.as_deref(), Some(INTERRUPTED_REASON));
        assert_eq!(scenes[1].image_url, None);

        let pending_story = reopened.get_story(&pending).await.unwrap();
        assert_eq!(pending_story.status, StoryStatus::Failed);
        assert_eq!(pending_story.error_message.as_deref(), Some(INTERRUPTED_REASON));

        let done_scenes = reopened.get_all_scenes(&done).await.unwrap();
        assert_eq!(done_scenes[0].audio_url.as_deref(), Some("a"));

        // The close-out is persisted, not recomputed per open.
        drop(reopened);
        let again = JobStore::open(dir.path()).await.unwrap();
        let scenes = again.get_all_scenes(&processing).await.unwrap();
        assert_eq!(scenes[1].audio_status, AssetStatus::Failed);
        assert_eq!(
            again.get_story_status(&processing).await.unwrap().status,
            StoryStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("stories");
        let store = JobStore::open(&state_dir).await.unwrap();
        let id = store
            .create_story("Untitled", StoryOptions::default())
            .await
            .unwrap();

        // Replace the state directory with a plain file so writes fail.
        tokio::fs::remove_dir_all(&state_dir).await.unwrap();
        tokio::fs::write(&state_dir, b"").await.unwrap();

        let err = store.add_scenes(&id, &texts(&["one"])).await.unwrap_err();
        assert!(err.is_storage_failure());
        assert!(store.get_all_scenes(&id).await.unwrap().is_empty());
        assert_eq!(
            store.get_story_status(&id).await.unwrap().status,
            StoryStatus::Pending
        );
    }
}
