//! End-to-end turns against scripted and hand-written model clients.

mod common;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use skill_agent::agent::{
    Agent, ContentPart, FragmentStream, ModelClient, ModelRequest, Role, ScriptedModel, ScriptedRound,
    TurnStatus,
};
use skill_agent::config::AgentConfig;
use skill_agent::error::Result;
use skill_agent::skills::{SkillRegistry, SkillRoot};
use skill_agent::stream::{RawFragment, StreamEvent};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use common::{collector, write_skill};

fn agent_in(working_directory: &Path, config: AgentConfig, model: Arc<ScriptedModel>) -> Agent {
    let config = AgentConfig {
        working_directory: working_directory.to_path_buf(),
        ..config
    };
    let registry = Arc::new(SkillRegistry::scan(config.resolved_skill_roots()));
    Agent::new(config, registry, model)
}

fn text_round(text: &str) -> Vec<RawFragment> {
    vec![RawFragment::text(text), RawFragment::turn_end()]
}

#[cfg(unix)]
#[tokio::test]
async fn a_skill_is_loaded_and_its_script_runs_through_bash() {
    let temp = tempdir().expect("temp dir should be created");
    let skills = temp.path().join("skills");
    let skill_dir = write_skill(
        &skills,
        "greeter",
        "Greets people",
        "Run `sh scripts/greet.sh <name>`.",
    );
    std::fs::create_dir_all(skill_dir.join("scripts")).expect("scripts dir should be created");
    std::fs::write(
        skill_dir.join("scripts/greet.sh"),
        "echo \"Hello, $1!\"\n",
    )
    .expect("script should be written");

    let command = format!("sh {}/scripts/greet.sh Ada", skill_dir.display());
    let model = Arc::new(ScriptedModel::new(vec![
        vec![
            RawFragment::call_start("c1", "load_skill"),
            RawFragment::delta("c1", "{\"skill_name\": \"greeter\"}"),
            RawFragment::turn_end(),
        ],
        vec![
            RawFragment::ToolCall {
                call_id: "c2".into(),
                name: "bash".into(),
                args: json!({ "command": command }),
            },
            RawFragment::turn_end(),
        ],
        text_round("Hello, Ada!"),
    ]));
    let config = AgentConfig::builder()
        .skill_roots(vec![SkillRoot::project(&skills)])
        .build();
    let mut agent = agent_in(temp.path(), config, Arc::clone(&model));
    let (sink, events) = collector();

    let outcome = agent
        .run_turn("Greet Ada", sink, CancellationToken::new())
        .await;

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.final_response, "Hello, Ada!");

    let loaded = &outcome.tool_executions[0];
    assert!(loaded.ok);
    assert!(loaded.output.contains("# Skill: greeter"));
    assert!(loaded.output.contains("Run `sh scripts/greet.sh <name>`."));
    assert_eq!(outcome.tool_executions[1].output, "[OK]\n\nHello, Ada!");

    let requests = model.requests();
    assert_eq!(requests.len(), 3);
    let last_messages = &requests[2].messages;
    assert_eq!(last_messages.last().map(|m| m.role), Some(Role::Tool));
    assert!(matches!(
        last_messages.last().map(|m| &m.content[..]),
        Some([ContentPart::ToolResult { call_id, content, is_error: false, .. }])
            if call_id == "c2" && content.contains("Hello, Ada!")
    ));

    let results = events
        .lock()
        .unwrap()
        .iter()
        .filter(|event| matches!(event, StreamEvent::ToolResult { ok: true, .. }))
        .count();
    assert_eq!(results, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn bundled_demo_session_replays_to_completion() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let config = AgentConfig::from_file(&root.join("demos/skill-agent.toml"))
        .expect("demo config should parse");
    let model = Arc::new(
        ScriptedModel::from_file(&root.join("demos/replay-basic.json"))
            .expect("demo fixture should parse"),
    );
    let mut agent = agent_in(root, config, Arc::clone(&model));
    assert!(agent.registry().get("hello-world").is_some());
    let (sink, events) = collector();

    let outcome = agent
        .run_turn("Say hello", sink, CancellationToken::new())
        .await;

    assert!(outcome.is_completed(), "{:?}", outcome.error);
    assert_eq!(
        outcome.final_response,
        "Let me load the greeting skill. Running the greeting script. The script says: Hello, World!"
    );
    assert_eq!(outcome.tool_executions.len(), 2);
    assert_eq!(outcome.tool_executions[1].output, "[OK]\n\nHello, World!");
    assert_eq!(model.remaining_rounds(), 0);
    assert!(events.lock().unwrap().last().is_some_and(StreamEvent::is_terminal));
}

#[tokio::test]
async fn requests_carry_the_skill_prompt_and_every_builtin_tool() {
    let temp = tempdir().expect("temp dir should be created");
    write_skill(temp.path(), "alpha", "First skill", "Alpha body");
    let model = Arc::new(ScriptedModel::new(vec![text_round("hi"), text_round("again")]));
    let config = AgentConfig::builder()
        .skill_roots(vec![SkillRoot::user(temp.path())])
        .build();
    let mut agent = agent_in(temp.path(), config, Arc::clone(&model));

    let (sink, _) = collector();
    agent.run_turn("hello", sink.clone(), CancellationToken::new()).await;
    agent.run_turn("and again", sink, CancellationToken::new()).await;

    let requests = model.requests();
    let first = &requests[0];
    assert!(first.system_prompt.contains("- **alpha**: First skill"));
    assert!(!first.system_prompt.contains("Alpha body"));
    let names: Vec<&str> = first.tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["load_skill", "bash", "read_file", "write_file", "edit", "glob", "grep", "list_dir"]
    );
    assert_eq!(first.settings.temperature, 1.0);

    let roles: Vec<Role> = requests[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
}

#[tokio::test(start_paused = true)]
async fn a_failed_round_is_retried_and_partial_text_rolled_back() {
    let model = Arc::new(ScriptedModel::from_rounds(vec![
        ScriptedRound::Failure {
            failure: "connection reset".into(),
        },
        ScriptedRound::Fragments(vec![
            RawFragment::text("half an ans"),
            RawFragment::Error {
                message: "overloaded".into(),
            },
        ]),
        ScriptedRound::Fragments(text_round("a whole answer")),
    ]));
    let config = AgentConfig::builder().stream_retries(2).build();
    let mut agent = agent_in(Path::new("."), config, Arc::clone(&model));
    let (sink, events) = collector();

    let outcome = agent.run_turn("hi", sink, CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.final_response, "a whole answer");
    assert_eq!(model.requests().len(), 3);

    let errors: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Error { message } => Some(message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["Stream error: connection reset", "overloaded"]);
}

#[tokio::test(start_paused = true)]
async fn calls_from_a_failed_attempt_are_closed_before_the_retry() {
    let model = Arc::new(ScriptedModel::from_rounds(vec![
        ScriptedRound::Fragments(vec![
            RawFragment::call_start("c1", "bash"),
            RawFragment::delta("c1", "{\"command\": \"ls"),
            RawFragment::Error {
                message: "overloaded".into(),
            },
        ]),
        ScriptedRound::Fragments(text_round("nothing to run")),
    ]));
    let config = AgentConfig::builder().stream_retries(1).build();
    let mut agent = agent_in(Path::new("."), config, Arc::clone(&model));
    let (sink, events) = collector();

    let outcome = agent.run_turn("hi", sink, CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert!(outcome.tool_executions.is_empty());
    let events = events.lock().unwrap();
    assert!(matches!(
        &events[..],
        [
            StreamEvent::ToolCall { .. },
            StreamEvent::Error { .. },
            StreamEvent::ToolResult { call_id, ok: false, content, .. },
            StreamEvent::Text { .. },
            StreamEvent::Done { .. },
        ] if call_id == "c1" && content == "[FAILED] Not executed: Stream error: overloaded"
    ));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_turn_without_done() {
    let model = Arc::new(ScriptedModel::from_rounds(vec![
        ScriptedRound::Failure {
            failure: "connection reset".into(),
        },
        ScriptedRound::Failure {
            failure: "connection reset".into(),
        },
        ScriptedRound::Fragments(text_round("never reached")),
    ]));
    let config = AgentConfig::builder().stream_retries(1).build();
    let mut agent = agent_in(Path::new("."), config, Arc::clone(&model));
    let (sink, events) = collector();

    let outcome = agent.run_turn("hi", sink, CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert_eq!(outcome.error.as_deref(), Some("Stream error: connection reset"));
    assert_eq!(model.remaining_rounds(), 1);
    assert!(!events.lock().unwrap().iter().any(StreamEvent::is_terminal));
}

#[tokio::test]
async fn provider_error_fragments_end_the_turn_when_retries_are_disabled() {
    let model = Arc::new(ScriptedModel::new(vec![vec![
        RawFragment::text("partial"),
        RawFragment::Error {
            message: "overloaded".into(),
        },
    ]]));
    let config = AgentConfig::builder().stream_retries(0).build();
    let mut agent = agent_in(Path::new("."), config, model);
    let (sink, events) = collector();

    let outcome = agent.run_turn("hi", sink, CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert_eq!(outcome.error.as_deref(), Some("Stream error: overloaded"));
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            StreamEvent::Text {
                content: "partial".into()
            },
            StreamEvent::error("overloaded"),
        ]
    );
}

#[tokio::test]
async fn the_tool_loop_is_bounded() {
    let temp = tempdir().expect("temp dir should be created");
    let list_call = |id: &str| {
        vec![
            RawFragment::ToolCall {
                call_id: id.into(),
                name: "list_dir".into(),
                args: json!({ "path": "." }),
            },
            RawFragment::turn_end(),
        ]
    };
    let model = Arc::new(ScriptedModel::new(vec![list_call("c1"), list_call("c2")]));
    let config = AgentConfig::builder().max_tool_rounds(1).build();
    let mut agent = agent_in(temp.path(), config, model);
    let (sink, events) = collector();

    let outcome = agent.run_turn("loop", sink, CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.tool_executions.len(), 1);
    assert_eq!(outcome.error.as_deref(), Some("tool loop exceeded 1 rounds"));
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&StreamEvent::error("tool loop exceeded 1 rounds"))
    );
}

/// Streams one fragment, then never yields again.
struct StallingModel;

#[async_trait]
impl ModelClient for StallingModel {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn stream(&self, _request: &ModelRequest) -> Result<FragmentStream> {
        let first = futures::stream::once(async { Ok(RawFragment::text("thinking about it")) });
        Ok(first.chain(futures::stream::pending()).boxed())
    }
}

#[tokio::test(start_paused = true)]
async fn a_silent_stream_times_out() {
    let config = AgentConfig::builder()
        .turn_timeout_secs(1)
        .stream_retries(0)
        .build();
    let mut agent = Agent::new(config, Arc::new(SkillRegistry::empty()), Arc::new(StallingModel));
    let (sink, events) = collector();

    let outcome = agent.run_turn("hi", sink, CancellationToken::new()).await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert_eq!(outcome.error.as_deref(), Some("Timeout after 1000ms"));
    assert_eq!(outcome.final_response, "thinking about it");
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&StreamEvent::error("model stream idle for 1s"))
    );
}

#[tokio::test]
async fn a_canceled_turn_emits_nothing() {
    let model = Arc::new(ScriptedModel::new(vec![text_round("unused")]));
    let mut agent = agent_in(Path::new("."), AgentConfig::default(), Arc::clone(&model));
    let (sink, events) = collector();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = agent.run_turn("hi", sink, cancel).await;

    assert_eq!(outcome.status, TurnStatus::Canceled);
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(model.remaining_rounds(), 1);
}
