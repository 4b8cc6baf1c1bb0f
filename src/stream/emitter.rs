//! Conversion of raw fragments into normalized [`StreamEvent`]s.

use crate::stream::event::StreamEvent;
use crate::stream::formatter::{classify, truncate, DisplayLimits, FAILURE_PREFIX};
use crate::stream::fragment::RawFragment;
use crate::stream::reconciler::{CallState, FragmentDisposition, ToolCallReconciler};

/// Stateful, non-blocking fragment-to-event transformer for one turn.
#[derive(Debug, Clone)]
pub struct StreamEventEmitter {
    reconciler: ToolCallReconciler,
    final_response: String,
    result_max_chars: usize,
}

impl Default for StreamEventEmitter {
    fn default() -> Self {
        Self::new(ToolCallReconciler::new())
    }
}

impl StreamEventEmitter {
    pub fn new(reconciler: ToolCallReconciler) -> Self {
        Self {
            reconciler,
            final_response: String::new(),
            result_max_chars: DisplayLimits::TOOL_RESULT_MAX,
        }
    }

    pub fn with_result_max_chars(mut self, result_max_chars: usize) -> Self {
        self.result_max_chars = result_max_chars;
        self
    }

    pub fn reconciler(&self) -> &ToolCallReconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut ToolCallReconciler {
        &mut self.reconciler
    }

    /// Response text accumulated so far in this turn.
    pub fn final_response(&self) -> &str {
        &self.final_response
    }

    /// Drop response text past `len` bytes, e.g. text streamed by an attempt that failed.
    pub fn truncate_response(&mut self, len: usize) {
        if len <= self.final_response.len() && self.final_response.is_char_boundary(len) {
            self.final_response.truncate(len);
        }
    }

    /// Events caused by one fragment, in the order the fragment produced them.
    pub fn process(&mut self, fragment: RawFragment) -> Vec<StreamEvent> {
        match fragment {
            RawFragment::Thinking { content } if !content.is_empty() => {
                vec![StreamEvent::Thinking { content }]
            }
            RawFragment::Text { content } if !content.is_empty() => {
                self.final_response.push_str(&content);
                vec![StreamEvent::Text { content }]
            }
            RawFragment::Thinking { .. } | RawFragment::Text { .. } => Vec::new(),
            RawFragment::ToolCallStart { call_id, name } => {
                vec![self.reconciler.observe_call_start(&call_id, &name).to_event()]
            }
            RawFragment::ToolCallDelta { call_id, fragment } => {
                let disposition = self
                    .reconciler
                    .observe_argument_fragment(call_id.as_deref(), &fragment);
                match disposition {
                    FragmentDisposition::Overflowed => self.call_event(call_id.as_deref()),
                    _ => Vec::new(),
                }
            }
            RawFragment::ToolCall {
                call_id,
                name,
                args,
            } => vec![self
                .reconciler
                .observe_complete_call(&call_id, &name, args)
                .to_event()],
            RawFragment::ToolCallEnd { call_id } => {
                if self.reconciler.finalize(&call_id) {
                    self.call_event(Some(&call_id))
                } else {
                    Vec::new()
                }
            }
            RawFragment::ToolResult {
                call_id,
                name,
                content,
            } => {
                let mut events = self.flush();
                events.push(self.tool_result(&call_id, &name, &content));
                events
            }
            RawFragment::TurnEnd {} => self.flush(),
            RawFragment::Error { message } => vec![StreamEvent::Error { message }],
        }
    }

    /// Finalize every open call and emit updated rows for the calls that changed.
    pub fn flush(&mut self) -> Vec<StreamEvent> {
        self.reconciler
            .finalize_all()
            .iter()
            .filter_map(|call_id| self.reconciler.get(call_id))
            .map(|call| call.to_event())
            .collect()
    }

    /// Classify a tool output, associate it with its call and build the result event.
    pub fn tool_result(&mut self, call_id: &str, name: &str, content: &str) -> StreamEvent {
        let ok = classify(content).ok;
        if !self.reconciler.mark_resulted(call_id) {
            tracing::debug!(call_id, "tool result for an untracked call");
        }
        StreamEvent::ToolResult {
            call_id: call_id.to_string(),
            name: name.to_string(),
            content: truncate(content, self.result_max_chars),
            ok,
        }
    }

    /// Drop unfinalized calls, e.g. when the turn is canceled.
    pub fn abort(&mut self) -> usize {
        self.reconciler.abort()
    }

    /// Close every call that has no result yet with a failed one, then forget all calls.
    pub fn discard_calls(&mut self, reason: &str) -> Vec<StreamEvent> {
        let events = self
            .reconciler
            .calls()
            .iter()
            .filter(|call| call.state() != CallState::Resulted)
            .map(|call| StreamEvent::ToolResult {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                content: format!("{FAILURE_PREFIX} {reason}"),
                ok: false,
            })
            .collect();
        self.reconciler.clear();
        events
    }

    /// Terminal event carrying the accumulated response; resets state for the next turn.
    pub fn done(&mut self) -> StreamEvent {
        self.reconciler.clear();
        StreamEvent::Done {
            final_response: std::mem::take(&mut self.final_response),
        }
    }

    fn call_event(&self, call_id: Option<&str>) -> Vec<StreamEvent> {
        call_id
            .and_then(|id| self.reconciler.get(id))
            .or_else(|| self.reconciler.last_call())
            .map(|call| vec![call.to_event()])
            .unwrap_or_default()
    }
}
