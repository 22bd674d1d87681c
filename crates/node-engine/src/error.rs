//! Error types for the node engine

use thiserror::Error;

/// Result type alias using NodeEngineError
pub type Result<T> = std::result::Result<T, NodeEngineError>;

/// Errors that can occur while a node handles its inputs
#[derive(Debug, Error)]
pub enum NodeEngineError {
    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Input present but unusable
    #[error("Invalid input '{port}': {reason}")]
    InvalidInput { port: String, reason: String },

    /// Task execution failed
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// Inference adapter error
    #[error("{0}")]
    Inference(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeEngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create an invalid input error for a port
    pub fn invalid(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            port: port.into(),
            reason: reason.into(),
        }
    }
}
