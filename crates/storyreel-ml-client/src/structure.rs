//! Story structure generation on top of a plain text model.

use async_trait::async_trait;
use serde::Deserialize;
use storyreel_models::StoryStructure;
use tracing::debug;

use crate::capability::{StoryGenerator, TextGenerator};
use crate::error::{MlClientError, MlClientResult};

/// Asks a [`TextGenerator`] for a JSON story and parses the reply.
pub struct PromptedStoryGenerator<T> {
    text: T,
}

impl<T: TextGenerator> PromptedStoryGenerator<T> {
    pub fn new(text: T) -> Self {
        Self { text }
    }

    pub fn inner(&self) -> &T {
        &self.text
    }

    fn build_prompt(document_text: &str, grade_level: &str, style: &str) -> String {
        format!(
            r#"You are turning a document into an illustrated, narrated story
for a {grade_level} reader. The illustrations will be drawn in this style: {style}.

Return ONLY a single JSON object with this schema:
{{
  "title": "Story title",
  "scenes": [
    "Narration text for scene 1",
    "Narration text for scene 2"
  ]
}}

Rules:
- Keep the scenes in reading order.
- Each scene is 2 to 4 sentences a {grade_level} reader can follow.
- Cover the key ideas of the document; do not invent facts.

DOCUMENT:
{document_text}
"#
        )
    }
}

#[async_trait]
impl<T: TextGenerator> StoryGenerator for PromptedStoryGenerator<T> {
    async fn generate_story_structure(
        &self,
        document_text: &str,
        grade_level: &str,
        style: &str,
    ) -> MlClientResult<StoryStructure> {
        let prompt = Self::build_prompt(document_text, grade_level, style);
        let reply = self.text.generate_text(&prompt).await?;
        let structure = parse_story_structure(&reply)?;
        debug!(
            title = %structure.title,
            scenes = structure.scenes.len(),
            "Parsed story structure"
        );
        Ok(structure)
    }
}

#[derive(Deserialize)]
struct RawStructure {
    #[serde(default)]
    title: String,
    scenes: Vec<RawScene>,
}

/// Models sometimes answer with scene objects instead of bare strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScene {
    Text(String),
    Object { text: String },
}

/// Parse a model reply into a normalized [`StoryStructure`].
///
/// Markdown code fences around the JSON are tolerated.
pub fn parse_story_structure(reply: &str) -> MlClientResult<StoryStructure> {
    let json = strip_code_fence(reply);
    let raw: RawStructure = serde_json::from_str(json).map_err(|e| {
        MlClientError::invalid_response(format!("Failed to parse story structure JSON: {}", e))
    })?;

    Ok(StoryStructure {
        title: raw.title,
        scenes: raw
            .scenes
            .into_iter()
            .map(|scene| match scene {
                RawScene::Text(text) | RawScene::Object { text } => text,
            })
            .collect(),
    }
    .normalized())
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
