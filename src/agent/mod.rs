//! Orchestration loop: model client seam, conversation history and the turn runner.

pub mod message;
pub mod model;
pub mod runner;
pub mod scripted;

pub use message::{ContentPart, ConversationMessage, Role};
pub use model::{FragmentStream, ModelClient, ModelRequest, ToolDefinition};
pub use runner::{Agent, StreamEventSink, ToolExecution, TurnOutcome, TurnStatus};
pub use scripted::{ScriptedFixture, ScriptedModel, ScriptedRound};
