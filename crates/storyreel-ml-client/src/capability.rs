//! Capability traits consumed by the story pipeline.
//!
//! Every call may fail transiently or permanently; callers wrap them in
//! their own retry policy and do not distinguish the two.

use async_trait::async_trait;
use storyreel_models::StoryStructure;

use crate::error::MlClientResult;

/// Free-form text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> MlClientResult<String>;
}

/// Turns a source document into a titled, ordered list of scene texts.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate_story_structure(
        &self,
        document_text: &str,
        grade_level: &str,
        style: &str,
    ) -> MlClientResult<StoryStructure>;
}

/// Produces encoded image bytes (PNG) for a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> MlClientResult<Vec<u8>>;
}

/// Produces encoded narration bytes (MP3) for a text in a given voice.
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    async fn generate_audio(&self, text: &str, voice: &str) -> MlClientResult<Vec<u8>>;
}
