//! Configuration system (layered: defaults < TOML file < env/.env < CLI flags).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillAgentError};
use crate::skills::{default_skill_roots, SkillRoot};
use crate::stream::{DisplayLimits, DEFAULT_MAX_ARGUMENT_BUFFER_BYTES};
use crate::tools::resolve_path;

/// Per-project config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".skill-agent.toml";

pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_PROVIDER: &str = "anthropic";
pub const DEFAULT_MAX_TOKENS: u32 = 16_000;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_THINKING_BUDGET: u32 = 10_000;

/// Model selection and sampling settings passed to the model client.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    #[builder(into, default = DEFAULT_PROVIDER.to_string())]
    pub provider: String,
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    #[builder(default = true)]
    pub enable_thinking: bool,
    #[builder(default = DEFAULT_THINKING_BUDGET)]
    pub thinking_budget: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ModelSettings {
    fn is_anthropic_family(&self) -> bool {
        self.provider == "anthropic" || self.model.to_lowercase().contains("claude")
    }

    /// Extended thinking on Anthropic-family models requires a temperature of 1.0.
    pub fn effective_temperature(&self) -> f64 {
        if self.enable_thinking && self.is_anthropic_family() {
            1.0
        } else {
            self.temperature
        }
    }
}

/// Guess a provider from a model name.
pub fn infer_provider(model: &str) -> Option<&'static str> {
    let model = model.to_lowercase();
    if model.contains("claude") {
        Some("anthropic")
    } else if model.contains("deepseek") {
        Some("deepseek")
    } else if model.contains("gpt") || model.contains("o1-") {
        Some("openai")
    } else {
        None
    }
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "deepseek" => "deepseek-reasoner",
        "openai" => "o1-preview",
        _ => DEFAULT_MODEL,
    }
}

/// Agent configuration.
///
/// Resolution order, lowest first:
/// 1. Built-in defaults
/// 2. TOML file (`.skill-agent.toml` in the working directory, or an explicit path)
/// 3. `.env` and process environment
/// 4. CLI flags (applied by the caller)
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory tools resolve relative paths against. Set at runtime, never read from file.
    #[serde(skip)]
    #[builder(into, default = PathBuf::from("."))]
    pub working_directory: PathBuf,
    /// Skill roots, lowest priority first. Empty means [`default_skill_roots`].
    #[builder(default)]
    pub skill_roots: Vec<SkillRoot>,
    #[builder(default)]
    pub model: ModelSettings,
    /// Replaces the default base prompt placed before the skills section.
    #[builder(into)]
    pub system_prompt: Option<String>,
    #[builder(default = 300)]
    pub tool_timeout_secs: u64,
    #[builder(default = DEFAULT_MAX_ARGUMENT_BUFFER_BYTES)]
    pub max_argument_buffer_bytes: usize,
    /// Longest wait for the next stream fragment before the turn is aborted.
    #[builder(default = 600)]
    pub turn_timeout_secs: u64,
    #[builder(default = 25)]
    pub max_tool_rounds: usize,
    #[builder(default = DisplayLimits::TOOL_RESULT_MAX)]
    pub result_max_chars: usize,
    #[builder(default = 2)]
    pub stream_retries: u32,
    #[builder(default)]
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Variables from a `.env` file; a missing file yields nothing.
fn read_dotenv(path: &Path) -> HashMap<String, String> {
    let Ok(entries) = dotenvy::from_path_iter(path) else {
        return HashMap::new();
    };
    entries
        .filter_map(|entry| match entry {
            Ok(pair) => Some(pair),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping malformed .env entry");
                None
            }
        })
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        SkillAgentError::Configuration(format!("{key} has an invalid value: '{value}'"))
    })
}

impl AgentConfig {
    /// Load defaults, the TOML file and the environment for `working_directory`.
    ///
    /// `explicit_file` must exist; the implicit `.skill-agent.toml` is optional.
    pub fn load(working_directory: &Path, explicit_file: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_file {
            Some(path) => Self::from_file(path)?,
            None => {
                let implicit = working_directory.join(CONFIG_FILE_NAME);
                if implicit.is_file() {
                    Self::from_file(&implicit)?
                } else {
                    Self::default()
                }
            }
        };
        config.working_directory = working_directory.to_path_buf();

        // Process environment wins over `.env` in the working directory.
        let dotenv = read_dotenv(&working_directory.join(".env"));
        config.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()))?;
        Ok(config)
    }

    /// Parse a TOML config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SkillAgentError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            SkillAgentError::Configuration(message) => {
                SkillAgentError::Configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| SkillAgentError::Configuration(e.to_string()))
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let provider = lookup("LLM_PROVIDER")
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty());
        let mut model = lookup("LLM_MODEL").filter(|value| !value.trim().is_empty());
        if model.is_none() && provider.as_deref().map_or(true, |p| p == "anthropic") {
            model = lookup("CLAUDE_MODEL").filter(|value| !value.trim().is_empty());
        }

        match (provider, model) {
            (Some(provider), Some(model)) => {
                self.model.provider = provider;
                self.model.model = model.trim().to_string();
            }
            (Some(provider), None) => {
                self.model.model = default_model_for(&provider).to_string();
                self.model.provider = provider;
            }
            (None, Some(model)) => {
                if let Some(provider) = infer_provider(&model) {
                    self.model.provider = provider.to_string();
                }
                self.model.model = model.trim().to_string();
            }
            (None, None) => {}
        }

        if let Some(value) = lookup("MAX_TOKENS") {
            self.model.max_tokens = parse_env("MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("DEFAULT_TEMPERATURE") {
            self.model.temperature = parse_env("DEFAULT_TEMPERATURE", &value)?;
        }
        if lookup("NO_THINKING").is_some_and(|value| is_truthy(&value)) {
            self.model.enable_thinking = false;
        }
        if let Some(value) = lookup("SKILLS_TOOL_TIMEOUT") {
            self.tool_timeout_secs = parse_env("SKILLS_TOOL_TIMEOUT", &value)?;
        }
        if lookup("SKILLS_DEBUG").is_some_and(|value| is_truthy(&value)) {
            self.debug = true;
        }
        Ok(())
    }

    /// Configured skill roots, or the default user and project roots.
    ///
    /// Configured roots expand `~` and are otherwise taken from the working directory.
    pub fn resolved_skill_roots(&self) -> Vec<SkillRoot> {
        if !self.skill_roots.is_empty() {
            return self
                .skill_roots
                .iter()
                .map(|root| {
                    let path = resolve_path(&root.path.to_string_lossy(), &self.working_directory);
                    SkillRoot::new(path, root.scope)
                })
                .collect();
        }
        let home = directories::UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        default_skill_roots(&self.working_directory, home.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::{infer_provider, AgentConfig, ModelSettings};
    use crate::skills::{SkillRoot, SkillScope};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AgentConfig::default();
        assert_eq!(config.tool_timeout_secs, 300);
        assert_eq!(config.max_argument_buffer_bytes, 1024 * 1024);
        assert_eq!(config.max_tool_rounds, 25);
        assert_eq!(config.result_max_chars, 2000);
        assert_eq!(config.model.max_tokens, 16_000);
        assert!(config.model.enable_thinking);
    }

    #[test]
    fn toml_overrides_only_present_keys() {
        let config = AgentConfig::from_toml_str(
            r#"
            tool_timeout_secs = 5

            [model]
            model = "gpt-4o"
            provider = "openai"

            [[skill_roots]]
            path = "/opt/skills"
            scope = "user"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.tool_timeout_secs, 5);
        assert_eq!(config.max_tool_rounds, 25);
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.model.max_tokens, 16_000);
        assert_eq!(config.skill_roots, vec![SkillRoot::new("/opt/skills", SkillScope::User)]);
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let err = AgentConfig::from_toml_str("tool_timeout_secs = \"soon\"").expect_err("invalid");
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn env_model_infers_its_provider() {
        let mut config = AgentConfig::default();
        config
            .apply_env(env(&[("LLM_MODEL", "deepseek-chat"), ("MAX_TOKENS", "512")]))
            .expect("env should apply");
        assert_eq!(config.model.provider, "deepseek");
        assert_eq!(config.model.model, "deepseek-chat");
        assert_eq!(config.model.max_tokens, 512);
    }

    #[test]
    fn env_provider_alone_selects_its_default_model() {
        let mut config = AgentConfig::default();
        config
            .apply_env(env(&[("LLM_PROVIDER", "OpenAI")]))
            .expect("env should apply");
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.model.model, "o1-preview");
    }

    #[test]
    fn env_flags_toggle_thinking_and_debug() {
        let mut config = AgentConfig::default();
        config
            .apply_env(env(&[("NO_THINKING", "yes"), ("SKILLS_DEBUG", "1"), ("SKILLS_TOOL_TIMEOUT", "9")]))
            .expect("env should apply");
        assert!(!config.model.enable_thinking);
        assert!(config.debug);
        assert_eq!(config.tool_timeout_secs, 9);
    }

    #[test]
    fn invalid_env_numbers_are_rejected() {
        let mut config = AgentConfig::default();
        let err = config
            .apply_env(env(&[("MAX_TOKENS", "lots")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn thinking_forces_temperature_for_anthropic_models() {
        let settings = ModelSettings::builder().temperature(0.2).build();
        assert_eq!(settings.effective_temperature(), 1.0);

        let settings = ModelSettings::builder()
            .temperature(0.2)
            .enable_thinking(false)
            .build();
        assert_eq!(settings.effective_temperature(), 0.2);

        let settings = ModelSettings::builder()
            .provider("openai")
            .model("gpt-4o")
            .temperature(0.3)
            .build();
        assert_eq!(settings.effective_temperature(), 0.3);
    }

    #[test]
    fn provider_inference_recognizes_families() {
        assert_eq!(infer_provider("claude-opus"), Some("anthropic"));
        assert_eq!(infer_provider("gpt-4o"), Some("openai"));
        assert_eq!(infer_provider("llama3"), None);
    }

    #[test]
    fn explicit_roots_replace_the_defaults() {
        let config = AgentConfig::builder()
            .working_directory("/work")
            .skill_roots(vec![SkillRoot::project("skills"), SkillRoot::user("/opt/skills")])
            .build();
        assert_eq!(
            config.resolved_skill_roots(),
            vec![SkillRoot::project("/work/skills"), SkillRoot::user("/opt/skills")]
        );

        let defaults = AgentConfig::builder().working_directory("/work").build();
        let roots = defaults.resolved_skill_roots();
        assert_eq!(roots.last().map(|root| root.path.as_path()), Some(Path::new("/work/.claude/skills")));
    }

    #[test]
    fn configured_roots_expand_the_home_directory() {
        let config = AgentConfig::builder()
            .working_directory("/work")
            .skill_roots(vec![SkillRoot::user("~/team-skills")])
            .build();
        let roots = config.resolved_skill_roots();

        assert_eq!(roots.len(), 1);
        assert!(roots[0].path.ends_with("team-skills"));
        assert!(!roots[0].path.starts_with("/work"));
    }

    #[test]
    fn dotenv_is_read_from_the_working_directory() {
        let temp = tempdir().expect("temp dir should be created");
        fs::write(temp.path().join(".env"), "SKILLS_TOOL_TIMEOUT=7\n").expect(".env written");

        let config = AgentConfig::load(temp.path(), None).expect("config should load");

        assert_eq!(config.tool_timeout_secs, 7);
        assert_eq!(config.working_directory, temp.path());
    }
}
