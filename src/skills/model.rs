//! Data types describing discovered and loaded skills.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Priority tier of the search root a skill was discovered under.
///
/// Project skills shadow user skills with the same name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SkillScope {
    User,
    Project,
}

/// Lightweight skill metadata (Level 1), rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillMetadata {
    /// Unique name within a resolved view.
    pub name: String,
    /// When-to-use description shown to the model.
    pub description: String,
    /// Skill bundle directory (parent of `SKILL.md`).
    pub source_path: PathBuf,
    /// Scope of the root that won the overlay for this name.
    pub scope: SkillScope,
}

impl SkillMetadata {
    /// Path of the manifest inside the bundle.
    pub fn manifest_path(&self) -> PathBuf {
        self.source_path.join(super::SKILL_FILE_NAME)
    }

    /// Single bullet line used in the system prompt.
    pub fn to_prompt_line(&self) -> String {
        format!("- **{}**: {}", self.name, self.description)
    }
}

/// Full skill content (Level 2), produced per `load` call and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillContent {
    pub name: String,
    pub description: String,
    /// Manifest body after the structured header, trimmed.
    pub instructions: String,
    pub scope: SkillScope,
    /// Skill bundle directory the content was read from.
    pub base_dir: PathBuf,
}

impl SkillContent {
    /// Conventional location of bundled scripts.
    pub fn scripts_dir(&self) -> PathBuf {
        self.base_dir.join("scripts")
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
