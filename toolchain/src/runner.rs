use crate::types::{RunOutcome, RunRequest};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("Failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{tool} produced unusable output: {message}")]
    UnusableOutput { tool: String, message: String },

    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

pub type ToolchainResult<T> = Result<T, ToolchainError>;

/// Runs a set of named test entities and reports per-entity outcomes.
///
/// Implementations shell out to an external, unmodified tool; the textual
/// output format is the tool's contract and is merely scraped here.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, request: &RunRequest) -> ToolchainResult<RunOutcome>;

    fn runner_name(&self) -> &'static str;
}
