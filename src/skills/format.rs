//! Rendering Level-1 skill metadata into the system prompt.

use crate::skills::registry::SkillRegistry;

/// Base prompt used when the caller does not supply one.
pub const DEFAULT_BASE_PROMPT: &str = "You are a helpful coding assistant with access to specialized skills.

Your capabilities include:
- Loading and using specialized skills for specific tasks
- Executing bash commands and scripts
- Reading and writing files
- Following skill instructions to complete complex tasks

When a user request matches a skill's description, use the load_skill tool to get detailed instructions before proceeding.";

const NO_SKILLS_SECTION: &str = "## Skills\n\nNo skills currently available.\n";

/// Render the skills section of the system prompt.
///
/// With no resolved skills this is a short "no skills" notice, never an empty string.
pub fn format_skills_for_prompt(registry: &SkillRegistry) -> String {
    if registry.is_empty() {
        return NO_SKILLS_SECTION.to_string();
    }

    let mut output = String::new();
    output.push_str("## Available Skills\n\n");
    output.push_str("You have access to the following specialized skills:\n\n");
    for skill in registry.skills() {
        output.push_str(&skill.to_prompt_line());
        output.push('\n');
    }
    output.push('\n');
    output.push_str("### How to Use Skills\n\n");
    output.push_str("1. **Discover**: Review the skills list above\n");
    output.push_str(
        "2. **Load**: When a user request matches a skill's description, use `load_skill(skill_name)` to get detailed instructions\n",
    );
    output.push_str(
        "3. **Execute**: Follow the skill's instructions, which may include running scripts via `bash`\n\n",
    );
    output.push_str(
        "**Important**: Only load a skill when it's relevant to the user's request. Script code never enters the context - only their output does.\n",
    );
    output
}

/// Join `base` (or [`DEFAULT_BASE_PROMPT`]) with the rendered skills section.
pub fn build_system_prompt(base: Option<&str>, registry: &SkillRegistry) -> String {
    let base = base
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .unwrap_or(DEFAULT_BASE_PROMPT);
    format!("{base}\n\n{}", format_skills_for_prompt(registry))
}
