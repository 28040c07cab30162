//! Clients for the generative services behind a story.
//!
//! The pipeline depends only on the capability traits in [`capability`];
//! the HTTP clients here are the production implementations:
//! - `GeminiClient`: text generation with an ordered model fallback list
//! - `OpenAiImageClient`: scene illustrations
//! - `OpenAiSpeechClient`: scene narration

pub mod capability;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod structure;

pub use capability::{AudioGenerator, ImageGenerator, StoryGenerator, TextGenerator};
pub use error::{MlClientError, MlClientResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use openai::{OpenAiConfig, OpenAiImageClient, OpenAiSpeechClient};
pub use structure::{parse_story_structure, PromptedStoryGenerator};
