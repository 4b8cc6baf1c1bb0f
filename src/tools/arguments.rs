//! Typed access to tool call arguments.

use crate::error::SkillAgentError;

/// Wrapper around finalized tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, SkillAgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SkillAgentError::InvalidArgument(format!("Missing string argument: {key}"))
            })
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, SkillAgentError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            SkillAgentError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
