//! skill-agent CLI binary entry point.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::tty::IsTty;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use skill_agent::agent::{Agent, ScriptedModel, StreamEventSink, TurnStatus};
use skill_agent::cli::errors::format_error_help;
use skill_agent::cli::render::TerminalRenderer;
use skill_agent::cli::session::{SessionCommand, HELP};
use skill_agent::cli::{ChatArgs, Cli, Commands, ReplayArgs, SkillsCommands};
use skill_agent::config::AgentConfig;
use skill_agent::error::SkillAgentError;
use skill_agent::skills::{build_system_prompt, SkillDiagnosticLevel, SkillRegistry};
use skill_agent::stream::truncate;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        let message = if let Some(err) = e.downcast_ref::<SkillAgentError>() {
            format_error_help(err)
        } else {
            format!("{e}")
        };
        eprintln!("Error: {message}");
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "skill_agent=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };
    let mut config = AgentConfig::load(&cwd, cli.config.as_deref())?;
    config.debug |= cli.debug;
    init_tracing(config.debug);

    match cli.command {
        Commands::Skills(args) => match args.command {
            SkillsCommands::List => list_skills(&config),
            SkillsCommands::Show(args) => show_skill(&config, &args.name),
        },
        Commands::Prompt => print_prompt(&config),
        Commands::Replay(args) => replay(config, args).await,
        Commands::Chat(args) => chat(config, args).await,
    }
}

fn scan(config: &AgentConfig) -> SkillRegistry {
    SkillRegistry::scan(config.resolved_skill_roots())
}

fn display_path(path: &Path) -> String {
    match directories::UserDirs::new() {
        Some(dirs) => match path.strip_prefix(dirs.home_dir()) {
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => path.display().to_string(),
        },
        None => path.display().to_string(),
    }
}

fn list_skills(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = scan(config);

    if registry.is_empty() {
        println!("No skills found.");
        println!("Searched:");
        for root in registry.roots() {
            println!("  [{}] {}", root.scope, display_path(&root.path));
        }
    } else {
        let width = registry.skills().map(|skill| skill.name.len()).max().unwrap_or(4).max(4);
        println!("{:<width$}  {:<7}  DESCRIPTION", "NAME", "SCOPE");
        for skill in registry.skills() {
            println!(
                "{:<width$}  {:<7}  {}",
                skill.name,
                skill.scope.to_string(),
                truncate(&skill.description, 60).replace('\n', " ")
            );
            println!("{:<width$}           {}", "", display_path(&skill.source_path));
        }
    }

    if !registry.diagnostics().is_empty() {
        println!();
        println!("Diagnostics:");
        for diagnostic in registry.diagnostics() {
            let level = match diagnostic.level {
                SkillDiagnosticLevel::Warning => "warning",
                SkillDiagnosticLevel::Override => "override",
            };
            println!("  {level}: {}", diagnostic.message);
        }
    }
    Ok(())
}

fn show_skill(config: &AgentConfig, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registry = scan(config);
    let skill = registry.load(name)?;
    println!("# {} ({})", skill.name, skill.scope);
    println!();
    println!("{}", skill.description);
    println!();
    println!("Base directory: {}", display_path(skill.base_dir()));
    if skill.scripts_dir().is_dir() {
        println!("Scripts: {}", display_path(&skill.scripts_dir()));
    }
    println!();
    println!("{}", skill.instructions);
    Ok(())
}

fn print_prompt(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = scan(config);
    let prompt = build_system_prompt(config.system_prompt.as_deref(), &registry);
    println!("{prompt}");
    eprintln!(
        "{} skills, ~{} tokens",
        registry.len(),
        prompt.chars().count() / 4
    );
    Ok(())
}

fn scripted_agent(
    mut config: AgentConfig,
    fixture: &Path,
    delay_ms: u64,
    no_thinking: bool,
) -> Result<Agent, Box<dyn std::error::Error>> {
    let model = ScriptedModel::from_file(fixture)?.with_fragment_delay(Duration::from_millis(delay_ms));
    if no_thinking {
        config.model.enable_thinking = false;
    }
    let registry = Arc::new(scan(&config));
    Ok(Agent::new(config, registry, Arc::new(model)))
}

/// Sink drawing one turn on stdout.
fn terminal_sink(show_thinking: bool) -> StreamEventSink {
    let stdout = std::io::stdout();
    let interactive = stdout.is_tty();
    let renderer = Arc::new(Mutex::new(
        TerminalRenderer::new(stdout, interactive).with_thinking(show_thinking),
    ));
    Arc::new(move |event| {
        if let Ok(mut renderer) = renderer.lock() {
            if let Err(error) = renderer.handle(&event) {
                tracing::debug!(%error, "failed to render event");
            }
        }
    })
}

/// Token canceled by Ctrl-C until the returned watcher is aborted.
fn cancel_on_interrupt() -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    (cancel, watcher)
}

async fn replay(config: AgentConfig, args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut agent = scripted_agent(config, &args.fixture, args.delay_ms, args.no_thinking)?;
    let (cancel, watcher) = cancel_on_interrupt();
    let outcome = agent
        .run_turn(args.prompt, terminal_sink(!args.no_thinking), cancel)
        .await;
    watcher.abort();

    match outcome.status {
        TurnStatus::Completed => Ok(()),
        TurnStatus::Canceled => {
            eprintln!("\nTurn canceled.");
            Ok(())
        }
        TurnStatus::Failed => Err(outcome
            .error
            .unwrap_or_else(|| "turn failed".to_string())
            .into()),
    }
}

async fn chat(config: AgentConfig, args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut agent = scripted_agent(config, &args.fixture, args.delay_ms, args.no_thinking)?;
    println!("Discovered {} skills", agent.registry().len());
    for skill in agent.registry().skills() {
        println!("  - {}", skill.name);
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match SessionCommand::parse(&line) {
            SessionCommand::Empty => {}
            SessionCommand::Exit => break,
            SessionCommand::Help => println!("{HELP}"),
            SessionCommand::Skills => list_skills(agent.config())?,
            SessionCommand::Prompt => println!("{}", agent.system_prompt()),
            SessionCommand::Temperature(None) => {
                println!("Current temperature: {}", agent.temperature());
            }
            SessionCommand::Temperature(Some(value)) => match agent.set_temperature(value) {
                Ok(()) => println!("Temperature set to {value}"),
                Err(error) => eprintln!("Cannot change temperature: {error}"),
            },
            SessionCommand::Clear => {
                agent.clear_history();
                println!("Conversation cleared.");
            }
            SessionCommand::Reload => {
                agent.reload_skills();
                println!("Reloaded {} skills", agent.registry().len());
            }
            SessionCommand::Invalid(reason) => eprintln!("{reason}. {HELP}"),
            SessionCommand::Message(message) => {
                let (cancel, watcher) = cancel_on_interrupt();
                let outcome = agent
                    .run_turn(message, terminal_sink(!args.no_thinking), cancel)
                    .await;
                watcher.abort();
                match outcome.status {
                    TurnStatus::Completed => {}
                    TurnStatus::Canceled => eprintln!("\nTurn canceled."),
                    TurnStatus::Failed => eprintln!(
                        "Turn failed: {}",
                        outcome.error.as_deref().unwrap_or("unknown error")
                    ),
                }
            }
        }
    }
    println!("Goodbye!");
    Ok(())
}
