//! Progressive story generation pipeline.
//!
//! This crate provides:
//! - `call_with_backoff`: the retry policy every generative call goes through
//! - `SceneMediaOrchestrator`: concurrent image + narration for one scene
//! - `StoryPipeline`: structure generation and bounded scene fan-out
//! - `UsageBudget`: daily per-capability call limits
//! - Tracing setup and pipeline metrics

pub mod config;
pub mod error;
mod external;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scene_media;
pub mod usage;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, StoryLogger};
pub use pipeline::{Generators, PipelineLaunch, StoryPipeline, PLACEHOLDER_TITLE};
pub use retry::{call_with_backoff, RetryConfig, RetryResult};
pub use scene_media::SceneMediaOrchestrator;
pub use usage::{Capability, CapabilityUsage, UsageBudget, UsageLimits, UsageSnapshot};
