//! Tool system: the trait the orchestration loop dispatches to and the built-in tools.

pub mod arguments;
pub mod builtin;
pub mod path;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use builtin::all_tools;
pub use path::resolve_path;
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::AgentToolParameters;
