//! Tests for the fragment → reconciler → emitter → formatter pipeline.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use skill_agent::stream::{
    classify, CallState, RawFragment, StreamEvent, StreamEventEmitter, ToolCallReconciler,
};

fn run(fragments: Vec<RawFragment>) -> (StreamEventEmitter, Vec<StreamEvent>) {
    let mut emitter = StreamEventEmitter::default();
    let events = fragments
        .into_iter()
        .flat_map(|fragment| emitter.process(fragment))
        .collect();
    (emitter, events)
}

#[test]
fn split_arguments_reassemble_after_turn_end() {
    let (emitter, _) = run(vec![
        RawFragment::call_start("1", "bash"),
        RawFragment::delta("1", "{\"cmd\":"),
        RawFragment::delta("1", "\"ls\"}"),
        RawFragment::turn_end(),
    ]);

    let call = emitter.reconciler().get("1").unwrap();
    assert!(call.args_complete);
    assert_eq!(call.args()["cmd"], "ls");
}

#[test]
fn fragment_accumulation_matches_direct_parse_at_every_split() {
    let raw = r#"{"command": "grep -rn \"fn main\" src", "timeout": 30, "tags": ["a", "ü"]}"#;
    let expected: Value = serde_json::from_str(raw).unwrap();

    let boundaries: Vec<usize> = raw.char_indices().map(|(i, _)| i).collect();
    for split in boundaries {
        let mut reconciler = ToolCallReconciler::new();
        reconciler.observe_call_start("c", "bash");
        reconciler.observe_argument_fragment(Some("c"), &raw[..split]);
        reconciler.observe_argument_fragment(Some("c"), &raw[split..]);
        reconciler.finalize_all();

        assert_eq!(reconciler.get("c").unwrap().args(), &expected, "split at {split}");
    }
}

#[test]
fn finalize_twice_keeps_the_first_result() {
    let mut reconciler = ToolCallReconciler::new();
    reconciler.observe_call_start("1", "glob");
    reconciler.observe_argument_fragment(Some("1"), "{\"pattern\": \"*.md\"}");

    assert!(reconciler.finalize("1"));
    let first = reconciler.get("1").unwrap().clone();
    assert!(!reconciler.finalize("1"));
    assert!(reconciler.finalize_all().is_empty());
    assert_eq!(reconciler.get("1").unwrap(), &first);
}

#[test]
fn unattributed_and_early_fragments_are_tolerated() {
    let (emitter, events) = run(vec![
        RawFragment::delta("late", "{\"path\":"),
        RawFragment::call_start("late", "list_dir"),
        RawFragment::delta("late", "\"src\"}"),
        RawFragment::call_start("2", "read_file"),
        RawFragment::ToolCallDelta {
            call_id: None,
            fragment: "{\"file_path\": \"a.rs\"}".into(),
        },
        RawFragment::turn_end(),
    ]);

    let reconciler = emitter.reconciler();
    assert_eq!(reconciler.get("late").unwrap().name, "list_dir");
    assert_eq!(reconciler.get("late").unwrap().args(), &json!({"path": "src"}));
    assert_eq!(reconciler.get("2").unwrap().args(), &json!({"file_path": "a.rs"}));

    let rows: Vec<(&str, bool)> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::ToolCall {
                call_id,
                args_complete,
                ..
            } => Some((call_id.as_str(), *args_complete)),
            _ => None,
        })
        .collect();
    assert_eq!(
        rows,
        vec![("late", false), ("2", false), ("late", true), ("2", true)]
    );
}

#[test]
fn malformed_arguments_finalize_as_invalid_calls() {
    let (emitter, events) = run(vec![
        RawFragment::call_start("1", "edit"),
        RawFragment::delta("1", "{\"file_path\": "),
        RawFragment::turn_end(),
    ]);

    let call = emitter.reconciler().get("1").unwrap();
    assert_eq!(call.state(), CallState::Finalized);
    assert!(!call.args_complete);
    assert!(!call.is_valid());
    assert!(call.error().unwrap().contains("invalid JSON"));
    assert_eq!(emitter.reconciler().invalid_calls().count(), 1);
    assert!(matches!(
        events.last(),
        Some(StreamEvent::ToolCall { args_complete: false, .. })
    ));
}

#[test]
fn whole_calls_and_argumentless_calls_finalize() {
    let (emitter, _) = run(vec![
        RawFragment::ToolCall {
            call_id: "a".into(),
            name: "glob".into(),
            args: json!({"pattern": "**/*.rs"}),
        },
        RawFragment::call_start("b", "list_dir"),
        RawFragment::turn_end(),
    ]);

    let ready: Vec<&str> = emitter
        .reconciler()
        .ready_calls()
        .map(|call| call.call_id.as_str())
        .collect();
    assert_eq!(ready, vec!["a", "b"]);
    assert_eq!(emitter.reconciler().get("b").unwrap().args(), &json!({}));
}

#[test]
fn abort_discards_unfinished_calls_only() {
    let mut reconciler = ToolCallReconciler::new();
    reconciler.observe_call_start("done", "bash");
    reconciler.finalize("done");
    reconciler.observe_call_start("open", "bash");
    reconciler.observe_argument_fragment(None, "{\"command\":");

    assert_eq!(reconciler.abort(), 1);
    assert!(reconciler.get("open").is_none());
    assert!(reconciler.get("done").is_some());
}

#[test]
fn results_mark_calls_and_cleanup_removes_them() {
    let (mut emitter, events) = run(vec![
        RawFragment::call_start("1", "bash"),
        RawFragment::delta("1", "{\"command\": \"ls\"}"),
        RawFragment::ToolResult {
            call_id: "1".into(),
            name: "bash".into(),
            content: "[OK]\n\nREADME.md".into(),
        },
    ]);

    assert!(matches!(
        events.last(),
        Some(StreamEvent::ToolResult { ok: true, .. })
    ));
    assert_eq!(emitter.reconciler().get("1").unwrap().state(), CallState::Resulted);
    assert_eq!(emitter.reconciler_mut().take_resulted().len(), 1);
    assert!(emitter.reconciler().is_empty());
}

#[test]
fn done_carries_the_turn_text_and_is_serialized_with_a_tag() {
    let (mut emitter, _) = run(vec![
        RawFragment::thinking("Plan first."),
        RawFragment::text("All "),
        RawFragment::text("done."),
        RawFragment::turn_end(),
    ]);

    let done = emitter.done();
    assert!(done.is_terminal());
    assert_eq!(
        serde_json::to_value(&done).unwrap(),
        json!({"type": "done", "final_response": "All done."})
    );
}

#[test]
fn raw_fragments_deserialize_from_tagged_json() {
    let fragments: Vec<RawFragment> = serde_json::from_value(json!([
        {"type": "tool_call_start", "call_id": "1", "name": "bash"},
        {"type": "tool_call_delta", "fragment": "{}"},
        {"type": "turn_end"}
    ]))
    .unwrap();

    assert_eq!(
        fragments,
        vec![
            RawFragment::call_start("1", "bash"),
            RawFragment::ToolCallDelta {
                call_id: None,
                fragment: "{}".into()
            },
            RawFragment::turn_end(),
        ]
    );
}

#[test]
fn classification_follows_the_marker_convention() {
    let ok = classify("[OK]\n\nhello");
    assert!(ok.ok);
    assert!(ok.summary.contains("hello"));

    let failed = classify("[FAILED] Exit code: 1\n\n--- stderr ---\nboom");
    assert!(!failed.ok);
    assert!(failed.summary.contains("boom"));

    assert!(classify("plain text").ok);
    assert_eq!(classify("").summary, "");
}
