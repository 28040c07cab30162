//! Story (generation job) models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StoryId(pub String);

impl StoryId {
    /// Generate a new random story ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Story lifecycle status.
///
/// `pending -> processing -> completed`, with `failed` reachable only from
/// `pending` (the story structure could not be produced).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    /// Waiting for the story structure
    #[default]
    Pending,
    /// Scenes exist, media generation in flight
    Processing,
    /// Every scene asset reached a terminal state
    Completed,
    /// Story structure generation failed
    Failed,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Pending => "pending",
            StoryStatus::Processing => "processing",
            StoryStatus::Completed => "completed",
            StoryStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, StoryStatus::Completed | StoryStatus::Failed)
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generation options chosen by the user at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoryOptions {
    /// Reading level the story is written for (e.g. "grade 5")
    #[serde(default = "default_grade_level")]
    pub grade_level: String,
    /// Narration voice passed to the audio model
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Visual and narrative style (e.g. "watercolor")
    #[serde(default = "default_style")]
    pub style: String,
}

fn default_grade_level() -> String {
    "grade 5".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_style() -> String {
    "storybook illustration".to_string()
}

impl Default for StoryOptions {
    fn default() -> Self {
        Self {
            grade_level: default_grade_level(),
            voice: default_voice(),
            style: default_style(),
        }
    }
}

/// A story row: one submitted document's generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Story {
    /// Unique story ID
    pub story_id: StoryId,

    /// Title (placeholder until the structure is generated)
    pub title: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: StoryStatus,

    /// Options the story was submitted with
    #[serde(default)]
    pub options: StoryOptions,

    /// Number of scenes (0 until scenes are added)
    #[serde(default)]
    pub total_scenes: u32,

    /// Scenes whose image and audio are both terminal
    #[serde(default)]
    pub completed_scenes: u32,

    /// Job-level failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp (immutable)
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When the last scene reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Story {
    /// Create a new pending story.
    pub fn new(title: impl Into<String>, options: StoryOptions) -> Self {
        let now = Utc::now();
        Self {
            story_id: StoryId::new(),
            title: title.into(),
            status: StoryStatus::Pending,
            options,
            total_scenes: 0,
            completed_scenes: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Mark story as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StoryStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Check if the story is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
