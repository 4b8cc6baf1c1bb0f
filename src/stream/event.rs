//! Normalized events consumed by the presentation layer.

use serde::{Deserialize, Serialize};

/// One normalized stream event.
///
/// `ToolCall` events sharing a `call_id` are updates of the same call, not new calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking {
        content: String,
    },
    Text {
        content: String,
    },
    ToolCall {
        call_id: String,
        name: String,
        args: serde_json::Value,
        args_complete: bool,
    },
    ToolResult {
        call_id: String,
        name: String,
        content: String,
        ok: bool,
    },
    Done {
        final_response: String,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether no further events follow in this turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// The call this event belongs to, for tool events.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::ToolCall { call_id, .. } | Self::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}
