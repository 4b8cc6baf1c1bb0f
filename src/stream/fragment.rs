//! Raw model-stream fragments, the input of the event pipeline.

use serde::{Deserialize, Serialize};

/// One unit of streamed model output as delivered by a [`ModelClient`](crate::agent::ModelClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawFragment {
    /// Reasoning text.
    Thinking { content: String },
    /// Response text.
    Text { content: String },
    /// A tool call was announced; arguments follow as deltas.
    ToolCallStart { call_id: String, name: String },
    /// A piece of a tool call's JSON arguments.
    ///
    /// Deltas without a `call_id` belong to the most recently announced call.
    ToolCallDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        fragment: String,
    },
    /// A tool call delivered whole, with structured arguments.
    ToolCall {
        call_id: String,
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// The stream closed argument accumulation for `call_id`.
    ToolCallEnd { call_id: String },
    /// Output of an executed tool, fed back into the stream.
    ToolResult {
        call_id: String,
        name: String,
        content: String,
    },
    /// The model finished its turn.
    TurnEnd {},
    /// Provider-side fault.
    Error { message: String },
}

impl RawFragment {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn call_start(call_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ToolCallStart {
            call_id: call_id.into(),
            name: name.into(),
        }
    }

    pub fn delta(call_id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::ToolCallDelta {
            call_id: Some(call_id.into()),
            fragment: fragment.into(),
        }
    }

    pub fn call_end(call_id: impl Into<String>) -> Self {
        Self::ToolCallEnd {
            call_id: call_id.into(),
        }
    }

    pub fn turn_end() -> Self {
        Self::TurnEnd {}
    }
}

#[cfg(test)]
mod tests {
    use super::RawFragment;
    use serde_json::json;

    #[test]
    fn fragments_deserialize_from_tagged_json() {
        let fragments: Vec<RawFragment> = serde_json::from_value(json!([
            {"type": "text", "content": "hi"},
            {"type": "tool_call_start", "call_id": "1", "name": "bash"},
            {"type": "tool_call_delta", "fragment": "{\"command\":"},
            {"type": "tool_call", "call_id": "2", "name": "glob", "args": {"pattern": "*.rs"}},
            {"type": "turn_end"}
        ]))
        .expect("fixture should deserialize");

        assert_eq!(fragments[0], RawFragment::text("hi"));
        assert_eq!(fragments[1], RawFragment::call_start("1", "bash"));
        assert_eq!(
            fragments[2],
            RawFragment::ToolCallDelta {
                call_id: None,
                fragment: "{\"command\":".into()
            }
        );
        assert!(matches!(&fragments[3], RawFragment::ToolCall { args, .. } if args["pattern"] == "*.rs"));
        assert_eq!(fragments[4], RawFragment::turn_end());
    }

    #[test]
    fn a_whole_call_without_args_defaults_to_null() {
        let fragment: RawFragment =
            serde_json::from_value(json!({"type": "tool_call", "call_id": "1", "name": "list_dir"}))
                .expect("fragment should deserialize");
        assert!(matches!(fragment, RawFragment::ToolCall { args, .. } if args.is_null()));
    }
}
