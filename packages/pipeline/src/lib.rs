pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod params;
pub mod retriever;
pub mod task_queue;

pub use config::{PipelineConfig, RetrieverConfig};
pub use db::{create_pool, run_migrations};
pub use error::PipelineError;
pub use models::{Task, TaskKind};
pub use retriever::{retrieve, run_retriever};
