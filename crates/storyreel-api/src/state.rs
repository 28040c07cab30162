//! Application state.

use std::sync::Arc;

use storyreel_state::{JobStore, StatusQuery};
use storyreel_storage::{blob_store_from_env, BlobStore};
use storyreel_worker::{Generators, StoryPipeline, UsageBudget, WorkerConfig};
use tracing::info;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<JobStore>,
    pub status: StatusQuery,
    pub pipeline: StoryPipeline,
    pub blobs: Arc<dyn BlobStore>,
    pub usage: Arc<UsageBudget>,
}

impl AppState {
    /// Create application state from environment configuration.
    pub async fn new(
        config: ApiConfig,
        worker_config: WorkerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(match &worker_config.state_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using persistent story state");
                JobStore::open(dir).await?
            }
            None => {
                info!("Using in-memory story state");
                JobStore::in_memory()
            }
        });
        let blobs = blob_store_from_env().await?;
        let usage = Arc::new(UsageBudget::new(worker_config.usage_limits));
        let pipeline = StoryPipeline::new(
            &worker_config,
            Arc::clone(&store),
            Generators::from_env()?,
            Arc::clone(&blobs),
            usage,
        );

        Ok(Self::from_pipeline(config, pipeline, blobs))
    }

    /// Assemble state around an existing pipeline.
    pub fn from_pipeline(
        config: ApiConfig,
        pipeline: StoryPipeline,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let store = Arc::clone(pipeline.store());
        Self {
            config,
            status: StatusQuery::new(Arc::clone(&store)),
            usage: Arc::clone(pipeline.usage()),
            store,
            pipeline,
            blobs,
        }
    }
}
