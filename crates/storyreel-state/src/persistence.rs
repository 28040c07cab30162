//! One-JSON-document-per-story persistence.
//!
//! Layout: `<dir>/<story_id>.json` holds the story row and its scene rows.
//! Documents are replaced through a temp file and a rename, so a reader
//! never sees a partially written story.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyreel_models::{AssetKind, AssetUpdate, Scene, Story, StoryId, StoryStatus};
use tracing::{debug, info, warn};

use crate::error::StateResult;

/// A story row together with its ordered scene rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub story: Story,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl StoryRecord {
    pub fn new(story: Story) -> Self {
        Self {
            story,
            scenes: Vec::new(),
        }
    }

    /// Recount fully terminal scenes; a processing story whose scenes are
    /// all terminal becomes completed.
    pub(crate) fn settle(&mut self, now: DateTime<Utc>) {
        let completed = self.scenes.iter().filter(|s| s.is_terminal()).count() as u32;
        self.story.completed_scenes = completed;

        if completed == self.story.total_scenes && self.story.status == StoryStatus::Processing {
            self.story.status = StoryStatus::Completed;
            self.story.completed_at = Some(now);
        }
    }

    /// Close out generation that no running task will finish.
    ///
    /// A pending story fails. In a processing story every non-terminal
    /// asset fails with `reason`, which completes the story. Returns
    /// whether the record changed.
    pub(crate) fn fail_interrupted(&mut self, reason: &str) -> bool {
        match self.story.status {
            StoryStatus::Pending => {
                self.story.fail(reason);
                true
            }
            StoryStatus::Processing => {
                for scene in &mut self.scenes {
                    for kind in [AssetKind::Image, AssetKind::Audio] {
                        scene.apply(kind, AssetUpdate::failed(reason));
                    }
                }
                let now = Utc::now();
                self.story.updated_at = now;
                self.settle(now);
                true
            }
            StoryStatus::Completed | StoryStatus::Failed => false,
        }
    }
}

/// Directory of story documents.
#[derive(Debug, Clone)]
pub struct StoryFiles {
    dir: PathBuf,
}

impl StoryFiles {
    /// Open (creating if needed) a state directory.
    pub async fn open(dir: impl Into<PathBuf>) -> StateResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, story_id: &StoryId) -> PathBuf {
        self.dir.join(format!("{}.json", story_id))
    }

    /// Load every story document in the directory.
    ///
    /// Unreadable documents are skipped with a warning; an unreadable
    /// directory is an error.
    pub async fn load_all(&self) -> StateResult<Vec<StoryRecord>> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<StoryRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable story document");
                }
            }
        }

        info!(dir = %self.dir.display(), stories = records.len(), "Loaded story documents");
        Ok(records)
    }

    /// Atomically replace a story document.
    pub async fn write(&self, record: &StoryRecord) -> StateResult<()> {
        let path = self.path_for(&record.story.story_id);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_vec(record)?;

        tokio::fs::write(&tmp, &payload).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(story_id = %record.story.story_id, bytes = payload.len(), "Persisted story");
        Ok(())
    }

    /// Remove a story document. Missing documents are not an error.
    pub async fn remove(&self, story_id: &StoryId) -> StateResult<()> {
        match tokio::fs::remove_file(self.path_for(story_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check that the directory is still reachable.
    pub async fn check(&self) -> StateResult<()> {
        tokio::fs::metadata(&self.dir).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_models::StoryOptions;

    #[tokio::test]
    async fn test_write_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let files = StoryFiles::open(dir.path().join("stories")).await.unwrap();

        let story = Story::new("Lighthouse", StoryOptions::default());
        let mut record = StoryRecord::new(story.clone());
        record.scenes.push(Scene::new(&story.story_id, 0, "The lamp flickers."));
        files.write(&record).await.unwrap();

        let loaded = files.load_all().await.unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[tokio::test]
    async fn test_load_skips_corrupt_documents() {
        let dir = tempfile::tempdir().unwrap();
        let files = StoryFiles::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("broken.json"), b"{not json")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"ignored")
            .await
            .unwrap();

        assert!(files.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let files = StoryFiles::open(dir.path()).await.unwrap();
        files.remove(&StoryId::from("nope")).await.unwrap();
    }
}
