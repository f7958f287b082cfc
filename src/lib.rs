pub mod browser;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod sentiment;
pub mod sink;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use pipeline::{Orchestrator, PipelineSettings, RunReport};
pub use utils::error::ScoutError;

pub type Result<T> = std::result::Result<T, ScoutError>;
