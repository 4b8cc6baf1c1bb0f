//! Replay client for recorded fragment rounds.
//!
//! Fixture format:
//!
//! ```json
//! {
//!   "rounds": [
//!     [
//!       {"type": "thinking", "content": "Check the skill first."},
//!       {"type": "tool_call_start", "call_id": "call_1", "name": "load_skill"},
//!       {"type": "tool_call_delta", "call_id": "call_1", "fragment": "{\"skill_name\":"},
//!       {"type": "tool_call_delta", "call_id": "call_1", "fragment": "\"hello-world\"}"},
//!       {"type": "turn_end"}
//!     ],
//!     [{"type": "text", "content": "Done."}, {"type": "turn_end"}]
//!   ]
//! }
//! ```
//!
//! Each call to [`ModelClient::stream`] replays the next round.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillAgentError};
use crate::stream::RawFragment;

use super::model::{FragmentStream, ModelClient, ModelRequest};

/// One scripted round: either fragments to stream or a transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptedRound {
    Fragments(Vec<RawFragment>),
    /// Fails the `stream` call itself, as a dropped connection would.
    Failure { failure: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedFixture {
    pub rounds: Vec<ScriptedRound>,
}

/// [`ModelClient`] that replays a fixed script.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    rounds: Mutex<VecDeque<ScriptedRound>>,
    requests: Mutex<Vec<ModelRequest>>,
    fragment_delay: Duration,
}

impl ScriptedModel {
    pub fn new(rounds: Vec<Vec<RawFragment>>) -> Self {
        Self::from_rounds(rounds.into_iter().map(ScriptedRound::Fragments).collect())
    }

    pub fn from_rounds(rounds: Vec<ScriptedRound>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let fixture: ScriptedFixture = serde_json::from_str(raw)?;
        Ok(Self::from_rounds(fixture.rounds))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Pause between fragments, for a live-looking replay.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    /// Rounds not yet replayed.
    pub fn remaining_rounds(&self) -> usize {
        self.rounds.lock().map(|rounds| rounds.len()).unwrap_or(0)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> SkillAgentError {
    SkillAgentError::InvalidState("scripted model lock poisoned".to_string())
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &ModelRequest) -> Result<FragmentStream> {
        self.requests.lock().map_err(poisoned)?.push(request.clone());

        let round = self.rounds.lock().map_err(poisoned)?.pop_front();
        let fragments = match round {
            Some(ScriptedRound::Fragments(fragments)) => fragments,
            Some(ScriptedRound::Failure { failure }) => {
                return Err(SkillAgentError::Stream(failure))
            }
            None => {
                return Err(SkillAgentError::InvalidState(
                    "scripted model has no rounds left".to_string(),
                ))
            }
        };

        let delay = self.fragment_delay;
        let stream = async_stream::stream! {
            for fragment in fragments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(fragment);
            }
        };
        Ok(Box::pin(stream))
    }
}
