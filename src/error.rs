//! Error types for the bank RAG agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Routing error: {0}")]
    RoutingError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Graph error: {0}")]
    GraphError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Turn exceeded the iteration cap of {0}")]
    IterationCapExceeded(u32),

    #[error("Agent invocation failed after {0} attempts")]
    RetriesExhausted(u32),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}
