//! Reassembly of streamed tool-call fragments into complete calls.

use serde_json::Value;
use strum::Display;

use crate::stream::event::StreamEvent;

/// Default bound on one call's raw argument buffer (1 MiB).
pub const DEFAULT_MAX_ARGUMENT_BUFFER_BYTES: usize = 1024 * 1024;

/// Lifecycle of one tool call within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CallState {
    /// Identifier seen, no argument data yet.
    Announced,
    /// Argument fragments are being buffered.
    Accumulating,
    /// Arguments parsed, or the parse failure recorded.
    Finalized,
    /// A tool result has been associated with the call.
    Resulted,
}

/// What happened to an argument fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentDisposition {
    /// Appended to a known call.
    Buffered,
    /// Appended to a placeholder created for an unseen `call_id`.
    Placeholder,
    /// The buffer bound was hit; the call was finalized as invalid.
    Overflowed,
    /// Ignored: no call to attribute it to, or the call is already finalized.
    Dropped,
}

/// A tool call being reassembled from stream fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub call_id: String,
    /// Tool identifier; may stay empty until finalize.
    pub name: String,
    raw_argument_buffer: String,
    structured_args: Option<Value>,
    args: Value,
    pub args_complete: bool,
    error: Option<String>,
    state: CallState,
}

impl PendingToolCall {
    fn new(call_id: &str, name: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            raw_argument_buffer: String::new(),
            structured_args: None,
            args: Value::Object(Default::default()),
            args_complete: false,
            error: None,
            state: CallState::Announced,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Parsed arguments once finalized; the best structured view so far otherwise.
    pub fn args(&self) -> &Value {
        match (&self.state, &self.structured_args) {
            (CallState::Announced | CallState::Accumulating, Some(args)) => args,
            _ => &self.args,
        }
    }

    pub fn raw_arguments(&self) -> &str {
        &self.raw_argument_buffer
    }

    /// Why the call cannot be dispatched, if finalize rejected it.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, CallState::Finalized | CallState::Resulted)
    }

    /// Finalized with usable arguments.
    pub fn is_valid(&self) -> bool {
        self.is_finalized() && self.error.is_none()
    }

    /// Display event for the current state of this call.
    pub fn to_event(&self) -> StreamEvent {
        StreamEvent::ToolCall {
            call_id: self.call_id.clone(),
            name: self.name.clone(),
            args: self.args().clone(),
            args_complete: self.args_complete,
        }
    }

    fn finalize(&mut self) {
        let raw = self.raw_argument_buffer.trim();
        let parsed = if raw.is_empty() {
            Ok(self
                .structured_args
                .take()
                .filter(|args| !args.is_null())
                .unwrap_or_else(|| Value::Object(Default::default())))
        } else {
            serde_json::from_str::<Value>(raw)
        };

        match parsed {
            Ok(args) if self.name.is_empty() => {
                self.args = args;
                self.error = Some("tool call finished without a tool name".to_string());
            }
            Ok(args) => {
                self.args = args;
                self.args_complete = true;
            }
            Err(error) => {
                tracing::warn!(call_id = %self.call_id, %error, "malformed tool call arguments");
                self.error = Some(format!("invalid JSON arguments: {error}"));
            }
        }
        self.state = CallState::Finalized;
    }
}

/// Tracks every tool call of one turn, keyed by `call_id`, in announcement order.
#[derive(Debug, Clone)]
pub struct ToolCallReconciler {
    calls: Vec<PendingToolCall>,
    last_call_id: Option<String>,
    max_buffer_bytes: usize,
}

impl Default for ToolCallReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallReconciler {
    pub fn new() -> Self {
        Self::with_max_buffer_bytes(DEFAULT_MAX_ARGUMENT_BUFFER_BYTES)
    }

    pub fn with_max_buffer_bytes(max_buffer_bytes: usize) -> Self {
        Self {
            calls: Vec::new(),
            last_call_id: None,
            max_buffer_bytes,
        }
    }

    fn position(&self, call_id: &str) -> Option<usize> {
        self.calls.iter().position(|call| call.call_id == call_id)
    }

    fn upsert(&mut self, call_id: &str, name: &str) -> &mut PendingToolCall {
        let index = match self.position(call_id) {
            Some(index) => {
                if !name.is_empty() && self.calls[index].name != name {
                    self.calls[index].name = name.to_string();
                }
                index
            }
            None => {
                self.calls.push(PendingToolCall::new(call_id, name));
                self.calls.len() - 1
            }
        };
        self.last_call_id = Some(call_id.to_string());
        &mut self.calls[index]
    }

    /// Announce a call. Repeated or late announcements update the name in place.
    pub fn observe_call_start(&mut self, call_id: &str, name: &str) -> &PendingToolCall {
        self.upsert(call_id, name)
    }

    /// Announce a call whose structured arguments arrived whole.
    ///
    /// Argument fragments may still follow; buffered text takes precedence at finalize.
    pub fn observe_complete_call(
        &mut self,
        call_id: &str,
        name: &str,
        args: Value,
    ) -> &PendingToolCall {
        let call = self.upsert(call_id, name);
        if !call.is_finalized() && !args.is_null() {
            call.structured_args = Some(args);
        }
        call
    }

    /// Append an argument fragment. `None` attributes it to the last announced call.
    pub fn observe_argument_fragment(
        &mut self,
        call_id: Option<&str>,
        fragment: &str,
    ) -> FragmentDisposition {
        let Some(call_id) = call_id
            .map(str::to_string)
            .or_else(|| self.last_call_id.clone())
        else {
            tracing::debug!("argument fragment arrived before any tool call; dropping");
            return FragmentDisposition::Dropped;
        };

        let (index, created) = match self.position(&call_id) {
            Some(index) => (index, false),
            None => {
                self.calls.push(PendingToolCall::new(&call_id, ""));
                self.last_call_id = Some(call_id.clone());
                (self.calls.len() - 1, true)
            }
        };
        let max_buffer_bytes = self.max_buffer_bytes;
        let call = &mut self.calls[index];

        if call.is_finalized() {
            tracing::debug!(call_id = %call.call_id, "fragment for finalized call; dropping");
            return FragmentDisposition::Dropped;
        }

        if call.raw_argument_buffer.len() + fragment.len() > max_buffer_bytes {
            tracing::warn!(
                call_id = %call.call_id,
                limit = max_buffer_bytes,
                "tool call arguments exceeded buffer limit"
            );
            call.raw_argument_buffer.clear();
            call.error = Some(format!(
                "arguments exceeded the {max_buffer_bytes} byte limit"
            ));
            call.state = CallState::Finalized;
            return FragmentDisposition::Overflowed;
        }

        call.raw_argument_buffer.push_str(fragment);
        call.state = CallState::Accumulating;
        if created {
            FragmentDisposition::Placeholder
        } else {
            FragmentDisposition::Buffered
        }
    }

    /// Parse the buffered arguments of `call_id`. Idempotent.
    ///
    /// Returns `true` only when this call moved the call into `Finalized`.
    pub fn finalize(&mut self, call_id: &str) -> bool {
        let Some(index) = self.position(call_id) else {
            return false;
        };
        let call = &mut self.calls[index];
        if call.is_finalized() {
            return false;
        }
        call.finalize();
        true
    }

    /// Finalize every call not yet finalized; returns the ids that changed, in order.
    pub fn finalize_all(&mut self) -> Vec<String> {
        self.calls
            .iter_mut()
            .filter(|call| !call.is_finalized())
            .map(|call| {
                call.finalize();
                call.call_id.clone()
            })
            .collect()
    }

    /// Associate a result with `call_id`. Unfinalized calls are finalized first.
    pub fn mark_resulted(&mut self, call_id: &str) -> bool {
        self.finalize(call_id);
        match self.position(call_id) {
            Some(index) => {
                self.calls[index].state = CallState::Resulted;
                true
            }
            None => false,
        }
    }

    /// Remove and return every call that already has a result.
    pub fn take_resulted(&mut self) -> Vec<PendingToolCall> {
        let (resulted, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.calls)
            .into_iter()
            .partition(|call| call.state == CallState::Resulted);
        self.calls = remaining;
        if self
            .last_call_id
            .as_deref()
            .is_some_and(|id| self.position(id).is_none())
        {
            self.last_call_id = None;
        }
        resulted
    }

    /// Discard every call still `Announced` or `Accumulating` without finalizing it.
    pub fn abort(&mut self) -> usize {
        let before = self.calls.len();
        self.calls.retain(PendingToolCall::is_finalized);
        self.last_call_id = None;
        before - self.calls.len()
    }

    /// Forget every call.
    pub fn clear(&mut self) {
        self.calls.clear();
        self.last_call_id = None;
    }

    pub fn get(&self, call_id: &str) -> Option<&PendingToolCall> {
        self.calls.iter().find(|call| call.call_id == call_id)
    }

    /// The call unattributed argument fragments currently go to.
    pub fn last_call(&self) -> Option<&PendingToolCall> {
        self.last_call_id.as_deref().and_then(|id| self.get(id))
    }

    /// All tracked calls in announcement order.
    pub fn calls(&self) -> &[PendingToolCall] {
        &self.calls
    }

    /// Finalized calls with valid arguments and no result yet.
    pub fn ready_calls(&self) -> impl Iterator<Item = &PendingToolCall> {
        self.calls
            .iter()
            .filter(|call| call.state == CallState::Finalized && call.error.is_none())
    }

    /// Finalized calls that were rejected and still need a diagnostic result.
    pub fn invalid_calls(&self) -> impl Iterator<Item = &PendingToolCall> {
        self.calls
            .iter()
            .filter(|call| call.state == CallState::Finalized && call.error.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
