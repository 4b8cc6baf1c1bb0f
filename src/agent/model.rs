//! Model client seam consumed by the turn runner.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::ModelSettings;
use crate::error::Result;
use crate::stream::RawFragment;
use crate::tools::Tool;

use super::message::ConversationMessage;

/// Fragment stream produced for one model round.
pub type FragmentStream = BoxStream<'static, Result<RawFragment>>;

/// Tool definition sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters().schema.clone(),
        }
    }
}

/// A request for one model round.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Base prompt plus the Level-1 skills section.
    pub system_prompt: String,
    pub messages: Vec<ConversationMessage>,
    pub tools: Vec<ToolDefinition>,
    pub settings: ModelSettings,
}

/// Source of streamed model output.
///
/// Implementations translate their wire protocol into [`RawFragment`]s. A round ends with
/// `turn_end` or when the stream is exhausted.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Client name for logs.
    fn name(&self) -> &str;

    /// Start streaming one round.
    async fn stream(&self, request: &ModelRequest) -> Result<FragmentStream>;
}
