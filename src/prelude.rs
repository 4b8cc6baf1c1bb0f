//! Convenience re-exports for common use.

pub use crate::agent::{Agent, ModelClient, ModelRequest, ScriptedModel, StreamEventSink, TurnOutcome, TurnStatus};
pub use crate::config::{AgentConfig, ModelSettings};
pub use crate::error::{Result, SkillAgentError};
pub use crate::skills::{SkillContent, SkillMetadata, SkillRegistry, SkillRoot, SkillScope};
pub use crate::stream::{RawFragment, StreamEvent, StreamEventEmitter, ToolCallReconciler};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments};
