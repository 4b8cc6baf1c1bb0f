//! Shared test helpers: skill trees on disk and event collection.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use skill_agent::agent::StreamEventSink;
use skill_agent::stream::StreamEvent;

/// Write `<root>/<folder>/SKILL.md` with a valid header and return the bundle directory.
pub fn write_skill(root: &Path, folder: &str, description: &str, body: &str) -> PathBuf {
    write_manifest(
        root,
        folder,
        &format!("---\nname: {folder}\ndescription: {description}\n---\n\n{body}\n"),
    )
}

/// Write an arbitrary manifest, e.g. a malformed one.
pub fn write_manifest(root: &Path, folder: &str, content: &str) -> PathBuf {
    let skill_dir = root.join(folder);
    fs::create_dir_all(&skill_dir).expect("skill dir should be created");
    fs::write(skill_dir.join("SKILL.md"), content).expect("skill file should be written");
    skill_dir
}

/// Sink that records every event.
pub fn collector() -> (StreamEventSink, Arc<Mutex<Vec<StreamEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let sink: StreamEventSink = Arc::new(move |event| sink_events.lock().unwrap().push(event));
    (sink, events)
}
