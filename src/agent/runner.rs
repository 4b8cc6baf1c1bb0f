//! Turn runner: streams the model, reconciles tool calls, executes tools and loops.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{self, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::SkillAgentError;
use crate::skills::{build_system_prompt, SkillRegistry};
use crate::stream::{
    classify, truncate, CallState, PendingToolCall, RawFragment, StreamEvent, StreamEventEmitter,
    ToolCallReconciler, FAILURE_PREFIX,
};
use crate::tools::{all_tools, Tool, ToolArguments, ToolExecutionContext};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

use super::message::{ContentPart, ConversationMessage};
use super::model::{ModelClient, ModelRequest, ToolDefinition};

/// Callback receiving every event of a turn, in emission order.
pub type StreamEventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// How a turn ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Failed,
    Canceled,
}

/// One dispatched (or refused) tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub call_id: String,
    pub name: String,
    pub args: Value,
    /// Untruncated tool output.
    pub output: String,
    pub ok: bool,
    pub duration_ms: u64,
}

/// Result of [`Agent::run_turn`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn_id: Uuid,
    pub status: TurnStatus,
    pub final_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tool_executions: Vec<ToolExecution>,
    /// Tool rounds executed during the turn.
    pub rounds: usize,
    pub finished_at: DateTime<Utc>,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }
}

struct TurnState {
    id: Uuid,
    executions: Vec<ToolExecution>,
    rounds: usize,
}

impl TurnState {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            executions: Vec::new(),
            rounds: 0,
        }
    }

    fn finish(self, status: TurnStatus, final_response: &str, error: Option<String>) -> TurnOutcome {
        TurnOutcome {
            turn_id: self.id,
            status,
            final_response: final_response.to_string(),
            error,
            tool_executions: self.executions,
            rounds: self.rounds,
            finished_at: Utc::now(),
        }
    }
}

enum RoundEnd {
    Finished,
    Canceled,
    Failed(SkillAgentError),
}

/// Conversation driver owning the skill registry, tools and history.
pub struct Agent {
    config: AgentConfig,
    registry: Arc<SkillRegistry>,
    model: Arc<dyn ModelClient>,
    tools: Vec<Arc<dyn Tool>>,
    context: ToolExecutionContext,
    system_prompt: String,
    history: Vec<ConversationMessage>,
}

impl Agent {
    /// Create an agent with every built-in tool.
    pub fn new(config: AgentConfig, registry: Arc<SkillRegistry>, model: Arc<dyn ModelClient>) -> Self {
        let system_prompt = build_system_prompt(config.system_prompt.as_deref(), &registry);
        let context = ToolExecutionContext::new(&config.working_directory, Arc::clone(&registry));
        Self {
            config,
            registry,
            model,
            tools: all_tools(),
            context,
            system_prompt,
            history: Vec::new(),
        }
    }

    /// Replace the tool set.
    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(tool);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition::from_tool(tool.as_ref()))
            .collect()
    }

    /// Rescan the skill roots and rebuild the system prompt.
    pub fn reload_skills(&mut self) {
        self.registry = Arc::new(self.registry.rescan());
        self.context = ToolExecutionContext::new(&self.config.working_directory, Arc::clone(&self.registry));
        self.system_prompt = build_system_prompt(self.config.system_prompt.as_deref(), &self.registry);
        tracing::debug!(skills = self.registry.len(), "skills reloaded");
    }

    /// Temperature sent with requests after thinking constraints are applied.
    pub fn temperature(&self) -> f64 {
        self.config.model.effective_temperature()
    }

    /// Change the sampling temperature for later turns.
    ///
    /// Fails outside `0.0..=1.0`, and while extended thinking pins the temperature to 1.0.
    pub fn set_temperature(&mut self, temperature: f64) -> crate::error::Result<()> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(SkillAgentError::InvalidArgument(
                "temperature must be between 0.0 and 1.0".to_string(),
            ));
        }
        let mut settings = self.config.model.clone();
        settings.temperature = temperature;
        if settings.effective_temperature() != temperature {
            return Err(SkillAgentError::InvalidState(
                "extended thinking requires a temperature of 1.0".to_string(),
            ));
        }
        self.config.model = settings;
        Ok(())
    }

    /// Run one user turn to completion, failure or cancellation.
    ///
    /// Tool, skill and argument failures are reported to the model as `[FAILED]` results and
    /// never end the turn. Only provider faults that outlive the retry budget, the tool-round
    /// limit or `cancel` stop it early. A turn that stops early leaves the history as it was
    /// before the turn.
    pub async fn run_turn(
        &mut self,
        user_message: impl Into<String>,
        sink: StreamEventSink,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let mut turn = TurnState::new();
        tracing::debug!(turn_id = %turn.id, model = self.model.name(), "turn start");
        let history_mark = self.history.len();
        self.history.push(ConversationMessage::user(user_message));

        let mut emitter = StreamEventEmitter::new(ToolCallReconciler::with_max_buffer_bytes(
            self.config.max_argument_buffer_bytes,
        ))
        .with_result_max_chars(self.config.result_max_chars);
        let retry = RetryPolicy::with_retries(self.config.stream_retries);

        loop {
            let mark = emitter.final_response().len();
            let mut attempt = 0;
            loop {
                match self.stream_round(&mut emitter, &sink, &cancel).await {
                    RoundEnd::Finished => break,
                    RoundEnd::Canceled => {
                        self.history.truncate(history_mark);
                        return cancel_turn(&mut emitter, turn);
                    }
                    RoundEnd::Failed(error) => {
                        let closed = emitter.discard_calls(&format!("Not executed: {error}"));
                        let discarded = closed.len();
                        for event in closed {
                            sink(event);
                        }
                        if !retry.should_retry(attempt, &error) {
                            tracing::warn!(turn_id = %turn.id, %error, "turn failed");
                            self.history.truncate(history_mark);
                            return turn.finish(
                                TurnStatus::Failed,
                                emitter.final_response(),
                                Some(error.to_string()),
                            );
                        }

                        tracing::warn!(
                            turn_id = %turn.id,
                            attempt = attempt + 1,
                            discarded,
                            %error,
                            "retrying model round"
                        );
                        emitter.truncate_response(mark);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                self.history.truncate(history_mark);
                                return cancel_turn(&mut emitter, turn);
                            }
                            _ = time::sleep(retry.delay_for(attempt)) => {}
                        }
                        attempt += 1;
                    }
                }
            }

            let round_text = emitter
                .final_response()
                .get(mark..)
                .unwrap_or_default()
                .to_string();
            let pending: Vec<PendingToolCall> = emitter
                .reconciler()
                .calls()
                .iter()
                .filter(|call| call.state() == CallState::Finalized)
                .cloned()
                .collect();

            if pending.is_empty() {
                if !round_text.is_empty() {
                    self.history.push(ConversationMessage::assistant(round_text, Vec::new()));
                }
                let final_response = emitter.final_response().to_string();
                sink(emitter.done());
                tracing::debug!(turn_id = %turn.id, rounds = turn.rounds, "turn completed");
                return turn.finish(TurnStatus::Completed, &final_response, None);
            }

            if turn.rounds >= self.config.max_tool_rounds {
                let message = format!("tool loop exceeded {} rounds", self.config.max_tool_rounds);
                for event in emitter.discard_calls(&format!("Not executed: {message}")) {
                    sink(event);
                }
                sink(StreamEvent::error(message.clone()));
                self.history.truncate(history_mark);
                return turn.finish(TurnStatus::Failed, emitter.final_response(), Some(message));
            }
            turn.rounds += 1;

            let mut tool_messages = Vec::with_capacity(pending.len());
            for call in &pending {
                let started = Instant::now();
                let output = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    output = self.dispatch(call) => Some(output),
                };
                let Some(output) = output else {
                    self.history.truncate(history_mark);
                    return cancel_turn(&mut emitter, turn);
                };

                let ok = classify(&output).ok;
                sink(emitter.tool_result(&call.call_id, &call.name, &output));
                tool_messages.push(ConversationMessage::tool_result(
                    &call.call_id,
                    &call.name,
                    truncate(&output, self.config.result_max_chars),
                    !ok,
                ));
                turn.executions.push(ToolExecution {
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    args: call.args().clone(),
                    output,
                    ok,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            emitter.reconciler_mut().take_resulted();

            let calls = pending
                .iter()
                .map(|call| ContentPart::ToolCall {
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    args: call.args().clone(),
                })
                .collect();
            self.history.push(ConversationMessage::assistant(round_text, calls));
            self.history.extend(tool_messages);
        }
    }

    fn request(&self) -> ModelRequest {
        let mut settings = self.config.model.clone();
        settings.temperature = settings.effective_temperature();
        ModelRequest {
            system_prompt: self.system_prompt.clone(),
            messages: self.history.clone(),
            tools: self.tool_definitions(),
            settings,
        }
    }

    async fn stream_round(
        &self,
        emitter: &mut StreamEventEmitter,
        sink: &StreamEventSink,
        cancel: &CancellationToken,
    ) -> RoundEnd {
        let request = self.request();
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RoundEnd::Canceled,
            result = self.model.stream(&request) => match result {
                Ok(stream) => stream,
                Err(error) => {
                    sink(StreamEvent::error(error.to_string()));
                    return RoundEnd::Failed(error);
                }
            },
        };

        let idle_timeout = Duration::from_secs(self.config.turn_timeout_secs);
        let mut idle_sleep = (!idle_timeout.is_zero()).then(|| Box::pin(time::sleep(idle_timeout)));
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RoundEnd::Canceled,
                _ = idle_elapsed(&mut idle_sleep) => {
                    sink(StreamEvent::error(format!(
                        "model stream idle for {}s",
                        self.config.turn_timeout_secs
                    )));
                    return RoundEnd::Failed(SkillAgentError::Timeout(idle_timeout.as_millis() as u64));
                }
                next = stream.next() => {
                    let Some(next) = next else {
                        for event in emitter.flush() {
                            sink(event);
                        }
                        return RoundEnd::Finished;
                    };
                    match next {
                        Ok(fragment) => {
                            if let Some(sleep) = idle_sleep.as_mut() {
                                sleep.as_mut().reset(Instant::now() + idle_timeout);
                            }
                            let turn_end = matches!(fragment, RawFragment::TurnEnd {});
                            let fault = match &fragment {
                                RawFragment::Error { message } => Some(message.clone()),
                                _ => None,
                            };
                            for event in emitter.process(fragment) {
                                sink(event);
                            }
                            if let Some(message) = fault {
                                return RoundEnd::Failed(SkillAgentError::Stream(message));
                            }
                            if turn_end {
                                return RoundEnd::Finished;
                            }
                        }
                        Err(error) => {
                            sink(StreamEvent::error(error.to_string()));
                            return RoundEnd::Failed(error);
                        }
                    }
                }
            }
        }
    }

    /// Tool output for one finalized call. Never fails: refusals and errors become `[FAILED]` text.
    async fn dispatch(&self, call: &PendingToolCall) -> String {
        if let Some(error) = call.error() {
            let error = SkillAgentError::ArgumentParse {
                call_id: call.call_id.clone(),
                message: error.to_string(),
            };
            return format!("{FAILURE_PREFIX} {error}. The call was not executed.");
        }

        let Some(tool) = self.tools.iter().find(|tool| tool.name() == call.name) else {
            let available: Vec<&str> = self.tools.iter().map(|tool| tool.name()).collect();
            return format!(
                "{FAILURE_PREFIX} Unknown tool '{}'. Available tools: {}",
                call.name,
                available.join(", ")
            );
        };

        tracing::debug!(call_id = %call.call_id, tool = %call.name, "executing tool");
        let args = ToolArguments::new(call.args().clone());
        let ctx = self.context.for_call(&call.call_id);
        let timeout = Duration::from_secs(self.config.tool_timeout_secs);
        match with_timeout(timeout, tool.execute(&args, &ctx)).await {
            Ok(output) => output,
            Err(SkillAgentError::Timeout(_)) => format!(
                "{FAILURE_PREFIX} Tool '{}' timed out after {} seconds.",
                call.name, self.config.tool_timeout_secs
            ),
            Err(error) => {
                tracing::warn!(call_id = %call.call_id, tool = %call.name, %error, "tool failed");
                format!("{FAILURE_PREFIX} {error}")
            }
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.model.name())
            .field("skills", &self.registry.len())
            .field("tools", &self.tools.len())
            .field("history", &self.history.len())
            .finish()
    }
}

fn cancel_turn(emitter: &mut StreamEventEmitter, turn: TurnState) -> TurnOutcome {
    let discarded = emitter.abort();
    emitter.reconciler_mut().clear();
    tracing::debug!(turn_id = %turn.id, discarded, "turn canceled");
    turn.finish(
        TurnStatus::Canceled,
        emitter.final_response(),
        Some(SkillAgentError::Canceled.to_string()),
    )
}

async fn idle_elapsed(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
