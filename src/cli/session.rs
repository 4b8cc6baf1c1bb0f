//! Slash commands accepted by the interactive chat session.

/// One line of chat input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Blank line.
    Empty,
    Exit,
    /// List the resolved skills.
    Skills,
    /// Print the current system prompt.
    Prompt,
    /// Show (`None`) or set the sampling temperature.
    Temperature(Option<f64>),
    /// Forget the conversation history.
    Clear,
    /// Rescan skill roots and rebuild the system prompt.
    Reload,
    Help,
    /// A slash command that could not be understood, with the reason.
    Invalid(String),
    /// Text for the model.
    Message(String),
}

pub const HELP: &str = "Commands: /exit to quit, /skills to list skills, /prompt to show the system prompt, \
/temp [value] to show or set the temperature, /clear to forget the conversation, /reload to rescan skills";

impl SessionCommand {
    pub fn parse(line: &str) -> Self {
        let input = line.trim();
        if input.is_empty() {
            return Self::Empty;
        }
        if !input.starts_with('/') {
            return Self::Message(input.to_string());
        }

        let mut parts = input.split_whitespace();
        let command = parts.next().unwrap_or_default().to_lowercase();
        let argument = parts.next();
        match command.as_str() {
            "/exit" | "/quit" | "/q" => Self::Exit,
            "/skills" => Self::Skills,
            "/prompt" => Self::Prompt,
            "/clear" => Self::Clear,
            "/reload" => Self::Reload,
            "/help" => Self::Help,
            "/temp" => match argument {
                None => Self::Temperature(None),
                Some(value) => match value.parse::<f64>() {
                    Ok(value) => Self::Temperature(Some(value)),
                    Err(_) => Self::Invalid(format!("'{value}' is not a number")),
                },
            },
            other => Self::Invalid(format!("unknown command {other}")),
        }
    }
}
