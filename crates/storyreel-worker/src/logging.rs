//! Tracing setup and structured story logging.

use storyreel_models::StoryId;
use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn";

/// Initialize the global tracing subscriber.
///
/// JSON output when `LOG_FORMAT=json`, colored text otherwise. The filter
/// comes from `RUST_LOG` when set.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Story logger for structured logging with consistent formatting.
///
/// Every event carries the story ID and the pipeline stage.
#[derive(Debug, Clone)]
pub struct StoryLogger {
    story_id: String,
    stage: String,
}

impl StoryLogger {
    pub fn new(story_id: &StoryId, stage: &str) -> Self {
        Self {
            story_id: story_id.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            story_id = %self.story_id,
            stage = %self.stage,
            "Story started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            story_id = %self.story_id,
            stage = %self.stage,
            "Story progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            story_id = %self.story_id,
            stage = %self.stage,
            "Story warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            story_id = %self.story_id,
            stage = %self.stage,
            "Story error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            story_id = %self.story_id,
            stage = %self.stage,
            "Story completed: {}", message
        );
    }

    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span carrying the story ID and stage, for instrumenting spawned tasks.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "story",
            story_id = %self.story_id,
            stage = %self.stage
        )
    }
}
