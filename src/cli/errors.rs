//! CLI-specific error formatting for user-facing messages.

use crate::config::CONFIG_FILE_NAME;
use crate::error::SkillAgentError;

/// Map a [`SkillAgentError`] to a user-facing help string with actionable guidance.
pub fn format_error_help(err: &SkillAgentError) -> String {
    match err {
        SkillAgentError::SkillNotFound { name, available } if available.is_empty() => {
            format!("Skill '{name}' not found and no skills were discovered. Run: skill-agent skills list")
        }
        SkillAgentError::SkillNotFound { name, available } => {
            format!("Skill '{name}' not found. Available skills: {}", available.join(", "))
        }
        SkillAgentError::Configuration(msg) => {
            format!("Configuration error: {msg}. Check your .env or {CONFIG_FILE_NAME}")
        }
        SkillAgentError::ManifestParse { path, message } => {
            format!("{message} Fix the header of {} and run: skill-agent skills list", path.display())
        }
        SkillAgentError::Serialization(e) => {
            format!("Invalid fixture JSON: {e}")
        }
        other => format!("{other}"),
    }
}
