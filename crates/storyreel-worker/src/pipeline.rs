//! Story pipeline controller.
//!
//! Takes document text to a story with one image and one narration per
//! scene:
//! 1. Ask the text model for a title and ordered scene texts (with retry)
//! 2. Persist the scenes so pollers see the text immediately
//! 3. Launch media generation for every scene, bounded by a shared
//!    scene semaphore, and return without waiting

use std::sync::Arc;

use futures::future::join_all;
use storyreel_ml_client::{
    AudioGenerator, GeminiClient, ImageGenerator, OpenAiConfig, OpenAiImageClient,
    OpenAiSpeechClient, PromptedStoryGenerator, StoryGenerator,
};
use storyreel_models::{Story, StoryId, StoryOptions, StoryStatus, StoryStructure};
use storyreel_state::{JobStore, StateResult};
use storyreel_storage::BlobStore;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, Instrument};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::external::call_external;
use crate::logging::StoryLogger;
use crate::metrics;
use crate::retry::RetryConfig;
use crate::scene_media::SceneMediaOrchestrator;
use crate::usage::{Capability, UsageBudget};

/// Title a story carries until its structure is generated.
pub const PLACEHOLDER_TITLE: &str = "Untitled story";

/// The generative services a pipeline calls.
#[derive(Clone)]
pub struct Generators {
    pub story: Arc<dyn StoryGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub audio: Arc<dyn AudioGenerator>,
}

impl Generators {
    /// Gemini for story text, OpenAI for images and narration.
    pub fn from_env() -> WorkerResult<Self> {
        let openai = OpenAiConfig::from_env()?;
        Ok(Self {
            story: Arc::new(PromptedStoryGenerator::new(GeminiClient::from_env()?)),
            image: Arc::new(OpenAiImageClient::new(openai.clone())?),
            audio: Arc::new(OpenAiSpeechClient::new(openai)?),
        })
    }
}

/// Scene tasks started by [`StoryPipeline::run_pipeline`].
#[derive(Debug)]
pub struct PipelineLaunch {
    pub story_id: StoryId,
    pub scene_count: usize,
    handles: Vec<JoinHandle<StateResult<()>>>,
}

impl PipelineLaunch {
    fn empty(story_id: StoryId) -> Self {
        Self {
            story_id,
            scene_count: 0,
            handles: Vec::new(),
        }
    }

    /// Wait for every scene task to finish.
    ///
    /// Returns the first store error a scene task hit. A panicked task is
    /// logged and otherwise ignored.
    pub async fn wait(self) -> StateResult<()> {
        let mut first_error = None;

        for result in join_all(self.handles).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(story_id = %self.story_id, error = %e, "Scene task failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!(story_id = %self.story_id, error = %e, "Scene task panicked");
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// Drives stories from document text to completed media.
///
/// Cheap to clone; clones share the store, the generators and the
/// process-wide concurrency limits.
#[derive(Clone)]
pub struct StoryPipeline {
    store: Arc<JobStore>,
    stories: Arc<dyn StoryGenerator>,
    media: Arc<SceneMediaOrchestrator>,
    usage: Arc<UsageBudget>,
    scene_slots: Arc<Semaphore>,
    external_calls: Arc<Semaphore>,
    retry: RetryConfig,
}

impl StoryPipeline {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<JobStore>,
        generators: Generators,
        blobs: Arc<dyn BlobStore>,
        usage: Arc<UsageBudget>,
    ) -> Self {
        let external_calls = Arc::new(Semaphore::new(config.max_external_calls.max(1)));
        let media = SceneMediaOrchestrator::new(
            Arc::clone(&store),
            generators.image,
            generators.audio,
            blobs,
            Arc::clone(&usage),
            Arc::clone(&external_calls),
            config.retry_config("scene_media"),
        );

        Self {
            store,
            stories: generators.story,
            media: Arc::new(media),
            usage,
            scene_slots: Arc::new(Semaphore::new(config.max_concurrent_scenes.max(1))),
            external_calls,
            retry: config.retry_config("story_structure"),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn usage(&self) -> &Arc<UsageBudget> {
        &self.usage
    }

    /// Create a story and run its pipeline in the background.
    ///
    /// A `title` given here is kept; otherwise the generated title replaces
    /// the placeholder. Returns as soon as the story exists; progress is
    /// observed through the store.
    pub async fn submit(
        &self,
        document_text: String,
        title: Option<String>,
        options: StoryOptions,
    ) -> StateResult<StoryId> {
        let keep_title = title.is_some();
        let title = title.unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());
        let story_id = self.store.create_story(title, options.clone()).await?;
        metrics::record_story_submitted();

        let pipeline = self.clone();
        let id = story_id.clone();
        tokio::spawn(async move {
            let logger = StoryLogger::new(&id, "pipeline");
            match pipeline.complete(&id, &document_text, &options, keep_title).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    logger.log_warning(&format!("Story deleted during generation: {}", e));
                }
                Err(e) => logger.log_error(&e.to_string()),
            }
        });

        Ok(story_id)
    }

    /// Run the pipeline and wait for every scene to reach a terminal state.
    pub async fn run_to_completion(
        &self,
        story_id: &StoryId,
        document_text: &str,
        options: &StoryOptions,
    ) -> StateResult<Story> {
        self.complete(story_id, document_text, options, false).await
    }

    async fn complete(
        &self,
        story_id: &StoryId,
        document_text: &str,
        options: &StoryOptions,
        keep_title: bool,
    ) -> StateResult<Story> {
        let launch = self.launch(story_id, document_text, options, keep_title).await?;
        launch.wait().await?;

        let story = self.store.get_story(story_id).await?;
        if story.status == StoryStatus::Completed {
            metrics::record_story_completed(story.total_scenes);
            StoryLogger::new(story_id, "pipeline").log_completion(&format!(
                "{} of {} scenes terminal",
                story.completed_scenes, story.total_scenes
            ));
        }
        Ok(story)
    }

    /// Generate the story structure, persist the scenes and launch media
    /// generation for each of them.
    ///
    /// Returns once the scene tasks are spawned. Structure generation that
    /// fails after retries, or yields no scenes, fails the story instead.
    pub async fn run_pipeline(
        &self,
        story_id: &StoryId,
        document_text: &str,
        options: &StoryOptions,
    ) -> StateResult<PipelineLaunch> {
        self.launch(story_id, document_text, options, false).await
    }

    /// `keep_title` leaves a title given at submission in place.
    async fn launch(
        &self,
        story_id: &StoryId,
        document_text: &str,
        options: &StoryOptions,
        keep_title: bool,
    ) -> StateResult<PipelineLaunch> {
        let logger = StoryLogger::new(story_id, "pipeline");
        logger.log_start(&format!(
            "{} characters, {}, style '{}'",
            document_text.chars().count(),
            options.grade_level,
            options.style
        ));

        let structure = match self.generate_structure(document_text, options).await {
            Ok(structure) if !structure.is_empty() => structure,
            Ok(_) => {
                let message = "Story structure contained no scenes".to_string();
                return self.fail(story_id, &logger, message, "empty_structure").await;
            }
            Err(e) => {
                let reason = if e.is_budget_exhausted() {
                    "budget_exhausted"
                } else {
                    "structure_generation"
                };
                let message = format!("Story structure generation failed: {}", e);
                return self.fail(story_id, &logger, message, reason).await;
            }
        };

        if !keep_title && !structure.title.is_empty() {
            self.store.set_title(story_id, structure.title.as_str()).await?;
        }
        self.store.add_scenes(story_id, &structure.scenes).await?;
        logger.log_progress(&format!(
            "'{}' has {} scenes, generating media",
            structure.title,
            structure.scenes.len()
        ));

        let scene_count = structure.scenes.len();
        let handles = structure
            .scenes
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                self.spawn_scene(story_id.clone(), index as u32, text, options.clone())
            })
            .collect();

        Ok(PipelineLaunch {
            story_id: story_id.clone(),
            scene_count,
            handles,
        })
    }

    async fn generate_structure(
        &self,
        document_text: &str,
        options: &StoryOptions,
    ) -> WorkerResult<StoryStructure> {
        if let Err(e) = self.usage.try_consume(Capability::Text) {
            metrics::record_budget_refusal(Capability::Text.as_str());
            return Err(e);
        }

        let structure = call_external(&self.retry, &self.external_calls, || {
            self.stories
                .generate_story_structure(document_text, &options.grade_level, &options.style)
        })
        .await?;
        Ok(structure.normalized())
    }

    async fn fail(
        &self,
        story_id: &StoryId,
        logger: &StoryLogger,
        message: String,
        reason: &str,
    ) -> StateResult<PipelineLaunch> {
        logger.log_error(&message);
        if self.store.fail_story(story_id, message).await? {
            metrics::record_story_failed(reason);
        }
        Ok(PipelineLaunch::empty(story_id.clone()))
    }

    fn spawn_scene(
        &self,
        story_id: StoryId,
        scene_index: u32,
        text: String,
        options: StoryOptions,
    ) -> JoinHandle<StateResult<()>> {
        let media = Arc::clone(&self.media);
        let slots = Arc::clone(&self.scene_slots);
        let span = tracing::info_span!("scene", story_id = %story_id, scene_index = scene_index);

        tokio::spawn(
            async move {
                // The semaphore is never closed.
                let Ok(_slot) = slots.acquire_owned().await else {
                    return Ok(());
                };
                media
                    .generate_scene_media(&story_id, scene_index, &text, &options)
                    .await
            }
            .instrument(span),
        )
    }
}
