//! Structured header parsing for `SKILL.md` manifests.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::skills::diagnostics::SkillDiagnostic;

const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 1024;
const RESERVED_NAME_TOKENS: [&str; 2] = ["anthropic", "claude"];

#[derive(Debug, Deserialize)]
struct SkillFrontmatter {
    name: Option<String>,
    description: Option<String>,
}

/// Header fields that passed validation.
#[derive(Debug)]
pub(crate) struct ParsedHeader {
    pub name: String,
    pub description: String,
}

static SKILL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9-]+$").expect("skill name validation regex must compile")
});

static MARKUP_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[A-Za-z][^>]*>").expect("markup tag regex must compile")
});

/// Split a manifest into its header text and body.
///
/// The header is delimited by `---` lines and must open on the first line.
pub(crate) fn split_manifest(content: &str) -> Option<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim() != "---" {
        return None;
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if line.trim() == "---" {
            let header = &content[header_start..offset];
            let body = &content[offset + line.len()..];
            return Some((header, body));
        }
        offset += line.len();
    }

    None
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(format!(
            "Skill name '{name}' must be between 1 and {MAX_NAME_LEN} chars."
        ));
    }

    if !SKILL_NAME_RE.is_match(name)
        || name.starts_with('-')
        || name.ends_with('-')
        || name.contains("--")
    {
        return Err(format!(
            "Skill name '{name}' is invalid. It must match /^[a-z0-9-]+$/, not start or end with '-', and not contain '--'."
        ));
    }

    if let Some(token) = RESERVED_NAME_TOKENS
        .iter()
        .find(|token| name.contains(*token))
    {
        return Err(format!(
            "Skill name '{name}' contains the reserved word '{token}'."
        ));
    }

    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.trim().is_empty() {
        return Err("Skill description must not be empty.".to_string());
    }

    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(format!(
            "Skill description must be at most {MAX_DESCRIPTION_LEN} chars."
        ));
    }

    if MARKUP_TAG_RE.is_match(description) {
        return Err("Skill description must not contain XML tags.".to_string());
    }

    Ok(())
}

fn directory_name(skill_dir: &Path) -> String {
    skill_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .to_string()
}

/// Parse and validate the header of a manifest read from `skill_dir`.
///
/// Returns `None` when the skill must be skipped. Diagnostics are returned either way.
pub(crate) fn parse_header(
    skill_dir: &Path,
    manifest_path: &Path,
    content: &str,
) -> (Option<ParsedHeader>, Vec<SkillDiagnostic>) {
    let mut diagnostics = Vec::new();

    let Some((header, _)) = split_manifest(content) else {
        diagnostics.push(SkillDiagnostic::warning(
            manifest_path,
            "Skill file is missing a YAML frontmatter header.",
        ));
        return (None, diagnostics);
    };

    let frontmatter = if header.trim().is_empty() {
        SkillFrontmatter {
            name: None,
            description: None,
        }
    } else {
        match serde_yaml::from_str::<SkillFrontmatter>(header) {
            Ok(frontmatter) => frontmatter,
            Err(error) => {
                diagnostics.push(SkillDiagnostic::warning(
                    manifest_path,
                    format!("Invalid skill frontmatter YAML: {error}"),
                ));
                return (None, diagnostics);
            }
        }
    };

    let Some(name) = frontmatter.name.map(|name| name.trim().to_string()) else {
        diagnostics.push(SkillDiagnostic::warning(
            manifest_path,
            "Skill frontmatter is missing required field: name.",
        ));
        return (None, diagnostics);
    };

    if let Err(message) = validate_name(&name) {
        diagnostics.push(SkillDiagnostic::warning(manifest_path, message));
        return (None, diagnostics);
    }

    let dir_name = directory_name(skill_dir);
    if !dir_name.is_empty() && name != dir_name {
        diagnostics.push(SkillDiagnostic::warning(
            manifest_path,
            format!("Skill name '{name}' does not match parent directory name '{dir_name}'."),
        ));
    }

    let Some(description) = frontmatter.description else {
        diagnostics.push(SkillDiagnostic::warning(
            manifest_path,
            "Skill frontmatter is missing required field: description.",
        ));
        return (None, diagnostics);
    };

    if let Err(message) = validate_description(&description) {
        diagnostics.push(SkillDiagnostic::warning(manifest_path, message));
        return (None, diagnostics);
    }

    (
        Some(ParsedHeader {
            name,
            description: description.trim().to_string(),
        }),
        diagnostics,
    )
}
