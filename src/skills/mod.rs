//! Skill discovery, precedence resolution and on-demand loading.
//!
//! Skills are disclosed progressively:
//! - Level 1: [`SkillRegistry::scan`] collects name/description metadata for the system prompt.
//! - Level 2: [`SkillRegistry::load`] reads the full instruction body when the model asks for it.
//! - Level 3: scripts bundled with a skill are run through the `bash` tool; only their output
//!   re-enters the conversation.

pub mod diagnostics;
pub mod format;
pub mod model;
pub mod registry;

mod frontmatter;

pub use diagnostics::{SkillDiagnostic, SkillDiagnosticLevel, SkillOverride};
pub use format::{build_system_prompt, format_skills_for_prompt, DEFAULT_BASE_PROMPT};
pub use model::{SkillContent, SkillMetadata, SkillScope};
pub use registry::{default_skill_roots, SkillRegistry, SkillRoot, SKILL_FILE_NAME};
