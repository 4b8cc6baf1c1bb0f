//! Diagnostics recorded while scanning skill roots.

use std::path::PathBuf;

/// Severity level for a skill diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillDiagnosticLevel {
    /// A malformed or unreadable manifest; the skill may have been skipped.
    Warning,
    /// A higher-priority root replaced a same-named skill.
    Override,
}

/// Describes one skill shadowing another during the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillOverride {
    /// The shared skill name.
    pub name: String,
    /// Bundle directory that stays in the resolved view.
    pub winner_path: PathBuf,
    /// Bundle directory that was replaced.
    pub loser_path: PathBuf,
}

/// A diagnostic reported while parsing or resolving a skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillDiagnostic {
    /// Severity/meaning of this diagnostic.
    pub level: SkillDiagnosticLevel,
    /// Human-readable diagnostic message.
    pub message: String,
    /// Path associated with the diagnostic.
    pub path: PathBuf,
    /// Present when this diagnostic records an override.
    pub shadowed: Option<SkillOverride>,
}

impl SkillDiagnostic {
    pub(crate) fn warning(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            level: SkillDiagnosticLevel::Warning,
            message: message.into(),
            path: path.into(),
            shadowed: None,
        }
    }

    pub(crate) fn overridden(name: &str, winner_path: PathBuf, loser_path: PathBuf) -> Self {
        Self {
            level: SkillDiagnosticLevel::Override,
            message: format!(
                "Skill '{name}' from '{}' overrides '{}'",
                winner_path.display(),
                loser_path.display(),
            ),
            path: loser_path.clone(),
            shadowed: Some(SkillOverride {
                name: name.to_string(),
                winner_path,
                loser_path,
            }),
        }
    }
}
