//! skill-agent: a streaming coding agent with progressive skill loading.
//!
//! Skills are discovered cheaply (name and description only) and injected into the system
//! prompt; their full instructions are loaded only when the model calls `load_skill`, and
//! bundled scripts run through the `bash` tool so that only their output enters the
//! conversation. Streamed model output passes through a tool-call reconciler and an event
//! emitter before reaching the presentation layer.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use skill_agent::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> skill_agent::error::Result<()> {
//! let config = AgentConfig::load(&std::env::current_dir()?, None)?;
//! let registry = Arc::new(SkillRegistry::scan(config.resolved_skill_roots()));
//! let model = ScriptedModel::from_file("demos/replay-basic.json".as_ref())?;
//! let mut agent = Agent::new(config, registry, Arc::new(model));
//!
//! let sink: StreamEventSink = Arc::new(|event| println!("{event:?}"));
//! let outcome = agent.run_turn("Say hello", sink, CancellationToken::new()).await;
//! println!("{}", outcome.final_response);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod prelude;
pub mod skills;
pub mod stream;
pub mod tools;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
