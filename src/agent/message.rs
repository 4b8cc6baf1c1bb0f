//! Conversation history exchanged with the model client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        call_id: String,
        name: String,
        args: Value,
    },
    ToolResult {
        call_id: String,
        name: String,
        content: String,
        is_error: bool,
    },
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationMessage {
    fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            role,
            content,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::Text { text: text.into() }])
    }

    /// Create an assistant message; empty text is omitted.
    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ContentPart>) -> Self {
        let text = text.into();
        let mut content = Vec::with_capacity(tool_calls.len() + 1);
        if !text.is_empty() {
            content.push(ContentPart::Text { text });
        }
        content.extend(tool_calls);
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message.
    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::new(
            Role::Tool,
            vec![ContentPart::ToolResult {
                call_id: call_id.into(),
                name: name.into(),
                content: content.into(),
                is_error,
            }],
        )
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Call identifiers of the tool calls in this message.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentPart, ConversationMessage, Role};
    use serde_json::json;

    #[test]
    fn assistant_messages_skip_empty_text() {
        let message = ConversationMessage::assistant(
            "",
            vec![ContentPart::ToolCall {
                call_id: "1".into(),
                name: "bash".into(),
                args: json!({"command": "ls"}),
            }],
        );
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content.len(), 1);
        assert_eq!(message.tool_call_ids(), vec!["1"]);
        assert_eq!(message.text(), "");
    }

    #[test]
    fn tool_results_serialize_with_a_type_tag() {
        let message = ConversationMessage::tool_result("1", "bash", "[OK]", false);
        let value = serde_json::to_value(&message.content[0]).expect("serializes");
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["is_error"], false);
    }
}
