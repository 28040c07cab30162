//! Story structure returned by the text model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Title plus the ordered scene texts of a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoryStructure {
    pub title: String,
    pub scenes: Vec<String>,
}

impl StoryStructure {
    /// Trim the title and scene texts and drop blank scenes, keeping order.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            scenes: self
                .scenes
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
