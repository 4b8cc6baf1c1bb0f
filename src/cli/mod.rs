//! CLI argument model for `skill-agent`.

pub mod errors;
pub mod render;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Streaming agent with progressive skill loading
#[derive(Parser, Debug)]
#[command(name = "skill-agent", version, about = "Streaming agent with progressive skill loading")]
pub struct Cli {
    /// Working directory for project skills and tools (defaults to the current directory)
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Explicit TOML config file (defaults to .skill-agent.toml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect discovered skills
    Skills(SkillsArgs),
    /// Print the system prompt with the skills section
    Prompt,
    /// Replay a recorded model session through the real tools
    Replay(ReplayArgs),
    /// Multi-turn session over a recorded model, with slash commands
    Chat(ChatArgs),
}

/// Arguments for the `skills` subcommand group.
#[derive(Parser, Debug)]
pub struct SkillsArgs {
    #[command(subcommand)]
    pub command: SkillsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SkillsCommands {
    /// List resolved skills and scan diagnostics
    List,
    /// Show a skill's full instructions
    Show(ShowArgs),
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Skill name
    pub name: String,
}

/// Arguments for `skill-agent replay`.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Fixture with recorded fragment rounds
    pub fixture: PathBuf,

    /// User message that opens the turn
    #[arg(short, long, default_value = "Run the recorded session")]
    pub prompt: String,

    /// Hide thinking output and disable extended thinking
    #[arg(long)]
    pub no_thinking: bool,

    /// Delay between replayed fragments in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,
}

/// Arguments for `skill-agent chat`.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Fixture with recorded fragment rounds, consumed across turns
    pub fixture: PathBuf,

    /// Hide thinking output and disable extended thinking
    #[arg(long)]
    pub no_thinking: bool,

    /// Delay between replayed fragments in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_skills_list() {
        let cli = Cli::try_parse_from(["skill-agent", "skills", "list"]).unwrap();
        match cli.command {
            Commands::Skills(skills) => assert!(matches!(skills.command, SkillsCommands::List)),
            other => panic!("expected Skills, got {other:?}"),
        }
    }

    #[test]
    fn parse_skills_show_with_global_flags() {
        let cli = Cli::try_parse_from([
            "skill-agent",
            "skills",
            "show",
            "pdf",
            "--cwd",
            "/work",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.cwd, Some(PathBuf::from("/work")));
        assert!(cli.debug);
        match cli.command {
            Commands::Skills(skills) => match skills.command {
                SkillsCommands::Show(args) => assert_eq!(args.name, "pdf"),
                other => panic!("expected Show, got {other:?}"),
            },
            other => panic!("expected Skills, got {other:?}"),
        }
    }

    #[test]
    fn parse_replay_with_defaults() {
        let cli = Cli::try_parse_from(["skill-agent", "replay", "demo.json"]).unwrap();
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.fixture, PathBuf::from("demo.json"));
                assert_eq!(args.prompt, "Run the recorded session");
                assert!(!args.no_thinking);
                assert_eq!(args.delay_ms, 0);
            }
            other => panic!("expected Replay, got {other:?}"),
        }
    }

    #[test]
    fn parse_replay_with_all_options() {
        let cli = Cli::try_parse_from([
            "skill-agent",
            "--config",
            "agent.toml",
            "replay",
            "demo.json",
            "-p",
            "extract the news",
            "--no-thinking",
            "--delay-ms",
            "20",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("agent.toml")));
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.prompt, "extract the news");
                assert!(args.no_thinking);
                assert_eq!(args.delay_ms, 20);
            }
            other => panic!("expected Replay, got {other:?}"),
        }
    }

    #[test]
    fn parse_chat() {
        let cli = Cli::try_parse_from(["skill-agent", "chat", "session.json", "--no-thinking"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.fixture, PathBuf::from("session.json"));
                assert!(args.no_thinking);
                assert_eq!(args.delay_ms, 0);
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["skill-agent"]).is_err());
    }

    #[test]
    fn parse_show_missing_name_is_error() {
        assert!(Cli::try_parse_from(["skill-agent", "skills", "show"]).is_err());
    }
}
