//! Streaming pipeline: raw model fragments in, normalized display events out.
//!
//! Every fragment passes through the [`StreamEventEmitter`], which hands tool-call
//! fragments to the [`ToolCallReconciler`] before producing [`StreamEvent`]s.

pub mod display;
pub mod emitter;
pub mod event;
pub mod formatter;
pub mod fragment;
pub mod reconciler;

pub use display::{format_tool_compact, format_tree_output};
pub use emitter::StreamEventEmitter;
pub use event::StreamEvent;
pub use formatter::{
    classify, detect_content_type, truncate, ContentType, DisplayLimits, ToolOutcome,
    FAILURE_PREFIX, SUCCESS_PREFIX,
};
pub use fragment::RawFragment;
pub use reconciler::{
    CallState, FragmentDisposition, PendingToolCall, ToolCallReconciler,
    DEFAULT_MAX_ARGUMENT_BUFFER_BYTES,
};
