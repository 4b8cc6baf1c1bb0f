//! Skill root scanning and the resolved, immutable skill view.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillAgentError};
use crate::skills::diagnostics::SkillDiagnostic;
use crate::skills::frontmatter::{parse_header, split_manifest};
use crate::skills::model::{SkillContent, SkillMetadata, SkillScope};

/// Manifest file every skill bundle must contain.
pub const SKILL_FILE_NAME: &str = "SKILL.md";

/// A skill search root and the scope assigned to skills found under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRoot {
    /// Directory whose immediate subdirectories are skill bundles.
    pub path: PathBuf,
    pub scope: SkillScope,
}

impl SkillRoot {
    pub fn new(path: impl Into<PathBuf>, scope: SkillScope) -> Self {
        Self {
            path: path.into(),
            scope,
        }
    }

    pub fn user(path: impl Into<PathBuf>) -> Self {
        Self::new(path, SkillScope::User)
    }

    pub fn project(path: impl Into<PathBuf>) -> Self {
        Self::new(path, SkillScope::Project)
    }
}

/// Default roots, ordered lowest priority first.
///
/// 1) `~/.claude/skills` (user)
/// 2) `~/.agents/skills` (user)
/// 3) `<cwd>/.agents/skills` (project)
/// 4) `<cwd>/.claude/skills` (project)
pub fn default_skill_roots(cwd: &Path, home: Option<&Path>) -> Vec<SkillRoot> {
    let mut roots = Vec::with_capacity(4);
    if let Some(home) = home {
        roots.push(SkillRoot::user(home.join(".claude").join("skills")));
        roots.push(SkillRoot::user(home.join(".agents").join("skills")));
    }
    roots.push(SkillRoot::project(cwd.join(".agents").join("skills")));
    roots.push(SkillRoot::project(cwd.join(".claude").join("skills")));
    roots
}

/// Resolved skill view built by an explicit scan.
///
/// Immutable after construction; call [`SkillRegistry::rescan`] to pick up changes on disk.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    roots: Vec<SkillRoot>,
    skills: BTreeMap<String, SkillMetadata>,
    diagnostics: Vec<SkillDiagnostic>,
}

impl SkillRegistry {
    /// Registry with no roots and no skills.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan `roots` in order, later roots overriding earlier ones on name collisions.
    ///
    /// Malformed manifests are skipped and recorded as warnings; a scan never fails.
    pub fn scan(roots: Vec<SkillRoot>) -> Self {
        let mut skills = BTreeMap::<String, SkillMetadata>::new();
        let mut diagnostics = Vec::new();

        for root in &roots {
            let mut seen_in_root = HashSet::<String>::new();
            for skill in scan_root(root, &mut diagnostics) {
                if !seen_in_root.insert(skill.name.clone()) {
                    diagnostics.push(SkillDiagnostic::warning(
                        skill.manifest_path(),
                        format!(
                            "Skill '{}' is defined more than once under '{}'; keeping the first.",
                            skill.name,
                            root.path.display()
                        ),
                    ));
                    continue;
                }

                if let Some(previous) = skills.get(&skill.name) {
                    tracing::debug!(
                        skill = %skill.name,
                        winner = %skill.source_path.display(),
                        loser = %previous.source_path.display(),
                        "skill overridden by higher-priority root"
                    );
                    diagnostics.push(SkillDiagnostic::overridden(
                        &skill.name,
                        skill.source_path.clone(),
                        previous.source_path.clone(),
                    ));
                }
                skills.insert(skill.name.clone(), skill);
            }
        }

        Self {
            roots,
            skills,
            diagnostics,
        }
    }

    /// Build a fresh registry from the same roots.
    pub fn rescan(&self) -> Self {
        Self::scan(self.roots.clone())
    }

    pub fn roots(&self) -> &[SkillRoot] {
        &self.roots
    }

    pub fn get(&self, name: &str) -> Option<&SkillMetadata> {
        self.skills.get(name)
    }

    /// Resolved skills ordered by name.
    pub fn skills(&self) -> impl Iterator<Item = &SkillMetadata> {
        self.skills.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.skills.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn diagnostics(&self) -> &[SkillDiagnostic] {
        &self.diagnostics
    }

    /// Read the full instruction body of `name` from its winning bundle.
    pub fn load(&self, name: &str) -> Result<SkillContent> {
        let metadata = self
            .skills
            .get(name)
            .ok_or_else(|| SkillAgentError::SkillNotFound {
                name: name.to_string(),
                available: self.names(),
            })?;

        let manifest_path = metadata.manifest_path();
        let content = fs::read_to_string(&manifest_path)?;
        let Some((_, body)) = split_manifest(&content) else {
            return Err(SkillAgentError::ManifestParse {
                path: manifest_path,
                message: "Skill file is missing a YAML frontmatter header.".to_string(),
            });
        };

        Ok(SkillContent {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            instructions: body.trim().to_string(),
            scope: metadata.scope,
            base_dir: metadata.source_path.clone(),
        })
    }
}

fn scan_root(root: &SkillRoot, diagnostics: &mut Vec<SkillDiagnostic>) -> Vec<SkillMetadata> {
    if !root.path.is_dir() {
        return Vec::new();
    }

    let entries = match fs::read_dir(&root.path) {
        Ok(entries) => entries,
        Err(error) => {
            diagnostics.push(SkillDiagnostic::warning(
                &root.path,
                format!("Unable to read skill root: {error}"),
            ));
            return Vec::new();
        }
    };

    let mut skill_dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_dir() && path.join(SKILL_FILE_NAME).is_file())
        .collect();
    skill_dirs.sort();

    let mut skills = Vec::with_capacity(skill_dirs.len());
    for skill_dir in skill_dirs {
        let manifest_path = skill_dir.join(SKILL_FILE_NAME);
        let content = match fs::read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(error) => {
                diagnostics.push(SkillDiagnostic::warning(
                    &manifest_path,
                    format!("Unable to read skill file: {error}"),
                ));
                continue;
            }
        };

        let (parsed, parse_diagnostics) = parse_header(&skill_dir, &manifest_path, &content);
        for diagnostic in &parse_diagnostics {
            tracing::warn!(path = %diagnostic.path.display(), "{}", diagnostic.message);
        }
        diagnostics.extend(parse_diagnostics);

        if let Some(header) = parsed {
            skills.push(SkillMetadata {
                name: header.name,
                description: header.description,
                source_path: skill_dir,
                scope: root.scope,
            });
        }
    }

    skills
}
