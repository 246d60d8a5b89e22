use thiserror::Error;

use pfr_harvester::HarvesterError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("harvest failed: {0}")]
    Harvest(#[from] HarvesterError),

    #[error("failed to serialize task payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("retrieval interrupted: {0}")]
    Interrupted(String),
}

impl PipelineError {
    /// Whether the archive reported that nothing matched the request.
    pub fn is_no_records_match(&self) -> bool {
        matches!(self, Self::Harvest(e) if e.is_no_records_match())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
