//! Worker error types.

use thiserror::Error;

use crate::usage::Capability;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Daily {0} budget exhausted")]
    BudgetExhausted(Capability),

    #[error("Generation failed: {0}")]
    Generation(#[from] storyreel_ml_client::MlClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] storyreel_storage::StorageError),

    #[error("State error: {0}")]
    State(#[from] storyreel_state::StateError),

    #[error("Worker is shutting down")]
    ShuttingDown(#[from] tokio::sync::AcquireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// True if the budget check refused the call before it was made.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, WorkerError::BudgetExhausted(_))
    }
}
