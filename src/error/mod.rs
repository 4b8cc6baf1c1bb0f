//! Error types for skill-agent.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for all skill-agent operations.
#[derive(Error, Debug)]
pub enum SkillAgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid skill manifest {}: {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    #[error("Skill '{name}' not found")]
    SkillNotFound {
        name: String,
        /// Names present in the resolved view at lookup time.
        available: Vec<String>,
    },

    #[error("Invalid arguments for tool call {call_id}: {message}")]
    ArgumentParse { call_id: String, message: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Turn canceled")]
    Canceled,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SkillAgentError {
    /// Build a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Whether a turn that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stream(_) | Self::Timeout(_))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SkillAgentError>;
