//! Per-scene image and narration generation.

use std::future::Future;
use std::sync::Arc;

use storyreel_ml_client::{AudioGenerator, ImageGenerator, MlClientResult};
use storyreel_models::{AssetKind, AssetUpdate, StoryId, StoryOptions};
use storyreel_state::{JobStore, StateResult};
use storyreel_storage::{scene_asset_key, BlobStore};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::WorkerResult;
use crate::external::call_external;
use crate::metrics;
use crate::retry::RetryConfig;
use crate::usage::{Capability, UsageBudget};

/// Drives the image and audio of one scene to a terminal state.
///
/// Generation failures end up as a `failed` asset in the store and never
/// reach the caller. Only store failures are returned.
pub struct SceneMediaOrchestrator {
    store: Arc<JobStore>,
    images: Arc<dyn ImageGenerator>,
    audio: Arc<dyn AudioGenerator>,
    blobs: Arc<dyn BlobStore>,
    usage: Arc<UsageBudget>,
    external_calls: Arc<Semaphore>,
    retry: RetryConfig,
}

impl SceneMediaOrchestrator {
    pub fn new(
        store: Arc<JobStore>,
        images: Arc<dyn ImageGenerator>,
        audio: Arc<dyn AudioGenerator>,
        blobs: Arc<dyn BlobStore>,
        usage: Arc<UsageBudget>,
        external_calls: Arc<Semaphore>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            images,
            audio,
            blobs,
            usage,
            external_calls,
            retry,
        }
    }

    /// Generate and record the image and narration of one scene.
    ///
    /// Both assets run concurrently; neither outcome affects the other.
    /// A story deleted mid-flight is not an error.
    pub async fn generate_scene_media(
        &self,
        story_id: &StoryId,
        scene_index: u32,
        scene_text: &str,
        options: &StoryOptions,
    ) -> StateResult<()> {
        for kind in [AssetKind::Image, AssetKind::Audio] {
            let marked = self
                .store
                .update_scene_asset(story_id, scene_index, kind, AssetUpdate::Processing)
                .await;
            if self.tolerate_missing(story_id, scene_index, marked)?.is_none() {
                return Ok(());
            }
        }

        let prompt = image_prompt(scene_text, &options.style);
        let (image, audio) = tokio::join!(
            self.produce_asset(story_id, scene_index, AssetKind::Image, || {
                self.images.generate_image(&prompt)
            }),
            self.produce_asset(story_id, scene_index, AssetKind::Audio, || {
                self.audio.generate_audio(scene_text, &options.voice)
            }),
        );

        image?;
        audio
    }

    async fn produce_asset<F, Fut>(
        &self,
        story_id: &StoryId,
        scene_index: u32,
        kind: AssetKind,
        generate: F,
    ) -> StateResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MlClientResult<Vec<u8>>>,
    {
        let update = match self.generate_and_store(story_id, scene_index, kind, generate).await {
            Ok(url) => AssetUpdate::completed(url),
            Err(e) => {
                warn!(
                    story_id = %story_id,
                    scene_index = scene_index,
                    asset = %kind,
                    error = %e,
                    "Scene asset failed"
                );
                AssetUpdate::failed(e.to_string())
            }
        };

        let status = update.status();
        let recorded = self
            .store
            .update_scene_asset(story_id, scene_index, kind, update)
            .await;
        if let Some(true) = self.tolerate_missing(story_id, scene_index, recorded)? {
            metrics::record_asset_outcome(kind, status);
            debug!(
                story_id = %story_id,
                scene_index = scene_index,
                asset = %kind,
                status = %status,
                "Scene asset recorded"
            );
        }
        Ok(())
    }

    async fn generate_and_store<F, Fut>(
        &self,
        story_id: &StoryId,
        scene_index: u32,
        kind: AssetKind,
        generate: F,
    ) -> WorkerResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MlClientResult<Vec<u8>>>,
    {
        let capability = match kind {
            AssetKind::Image => Capability::Image,
            AssetKind::Audio => Capability::Audio,
        };
        if let Err(e) = self.usage.try_consume(capability) {
            metrics::record_budget_refusal(capability.as_str());
            return Err(e);
        }

        let retry = self.retry.named(format!("generate_{}", kind));
        let bytes = call_external(&retry, &self.external_calls, generate).await?;

        let (file_name, content_type) = asset_file(kind);
        let key = scene_asset_key(story_id.as_str(), scene_index, file_name);
        Ok(self.blobs.put(&key, bytes, content_type).await?)
    }

    /// Turn "story not found" into `Ok(None)` so writes racing a deletion
    /// are dropped quietly.
    fn tolerate_missing<T>(
        &self,
        story_id: &StoryId,
        scene_index: u32,
        result: StateResult<T>,
    ) -> StateResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => {
                warn!(
                    story_id = %story_id,
                    scene_index = scene_index,
                    error = %e,
                    "Story gone while generating media; dropping update"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// File name and content type of a stored scene asset.
fn asset_file(kind: AssetKind) -> (&'static str, &'static str) {
    match kind {
        AssetKind::Image => ("image.png", "image/png"),
        AssetKind::Audio => ("audio.mp3", "audio/mpeg"),
    }
}

/// Illustration prompt for one scene.
pub fn image_prompt(scene_text: &str, style: &str) -> String {
    format!(
        "An illustration in the style of {}, with no text or lettering, showing this scene: {}",
        style,
        scene_text.trim()
    )
}
