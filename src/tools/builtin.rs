//! Built-in tools for the skill agent.
//!
//! `load_skill` reads Level-2 skill instructions from the registry; `bash` runs commands
//! and bundled scripts (Level 3). The remaining tools cover the file operations a coding
//! agent needs. Every tool reports through the `[OK]` / `[FAILED]` text convention and
//! resolves paths against [`ToolExecutionContext::working_directory`].
//!
//! ```rust,no_run
//! use skill_agent::tools::builtin::all_tools;
//!
//! let tools = all_tools();
//! assert_eq!(tools.len(), 8);
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use ignore::overrides::OverrideBuilder;
use ignore::{DirEntry, WalkBuilder};
use regex::Regex;
use serde::Deserialize;

use crate::error::SkillAgentError;
use crate::skills::SkillContent;
use crate::tools::path::{display_relative, resolve_path};
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::AgentToolParameters;

const READ_FILE_MAX_LINES: usize = 2000;
const GLOB_MAX_RESULTS: usize = 100;
const GREP_MAX_MATCHES: usize = 50;
const GREP_LINE_MAX_CHARS: usize = 100;
const LIST_DIR_MAX_ENTRIES: usize = 100;
const SKIPPED_DIRS: [&str; 5] = [".git", "node_modules", "__pycache__", "venv", ".venv"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|kind| kind.is_dir())
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn walker(root: &Path, include_hidden: bool) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(!include_hidden)
        .filter_entry(|entry| !is_skipped_dir(entry));
    builder
}

fn shell_command(command: &str) -> tokio::process::Command {
    #[cfg(windows)]
    {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Render a finished command as `[OK]` / `[FAILED] Exit code: N`, stdout and a stderr section.
pub fn format_command_output(exit_code: Option<i32>, stdout: &str, stderr: &str) -> String {
    let mut parts = vec![
        match exit_code {
            Some(0) => "[OK]".to_string(),
            Some(code) => format!("[FAILED] Exit code: {code}"),
            None => "[FAILED] Terminated by signal".to_string(),
        },
        String::new(),
    ];

    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    if !stdout.is_empty() {
        parts.push(stdout.to_string());
    }
    if !stderr.is_empty() {
        if !stdout.is_empty() {
            parts.push(String::new());
        }
        parts.push("--- stderr ---".to_string());
        parts.push(stderr.to_string());
    }
    if stdout.is_empty() && stderr.is_empty() {
        parts.push("(no output)".to_string());
    }
    parts.join("\n")
}

fn format_loaded_skill(content: &SkillContent) -> String {
    let skill_dir = content.base_dir().display();
    let scripts_dir = content.scripts_dir();
    let scripts_dir = scripts_dir.display();
    format!(
        "[OK]\n\n# Skill: {name}\n\n## Instructions\n\n{instructions}\n\n## Skill Path Info\n\n\
         - **Skill Directory**: `{skill_dir}`\n\
         - **Scripts Directory**: `{scripts_dir}`\n\n\
         **Important**: When running scripts, use absolute paths like `{scripts_dir}/script_name [args]`.\n",
        name = content.name,
        instructions = content.instructions,
    )
}

fn format_skill_not_found(name: &str, available: &[String]) -> String {
    if available.is_empty() {
        format!("[FAILED] Skill '{name}' not found. No skills are currently available.")
    } else {
        format!(
            "[FAILED] Skill '{name}' not found. Available skills: {}",
            available.join(", ")
        )
    }
}

/// Create the `load_skill` tool: returns a skill's full instructions (Level 2).
pub fn load_skill_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "load_skill",
        "Load a skill's detailed instructions. Use this when the user's request matches a \
         skill's description from the available skills list. The instructions may tell you \
         to run bundled scripts via the bash tool.",
        AgentToolParameters::object()
            .string(
                "skill_name",
                "Name of the skill to load (e.g., 'news-extractor')",
                true,
            )
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let skill_name = args.get_str("skill_name")?;
            match ctx.registry.load(skill_name) {
                Ok(content) => {
                    tracing::debug!(skill = %content.name, "loaded skill instructions");
                    Ok(format_loaded_skill(&content))
                }
                Err(SkillAgentError::SkillNotFound { name, available }) => {
                    Ok(format_skill_not_found(&name, &available))
                }
                Err(error) => Err(error),
            }
        },
    ))
}

/// Create the `bash` tool: runs a shell command in the working directory.
///
/// The child is killed if the caller drops the future, so an outer timeout
/// terminates the process.
pub fn bash_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "bash",
        "Execute a shell command (sh on Unix, cmd.exe on Windows). Use this to run skill \
         scripts, install dependencies or inspect the system. Script code never enters the \
         context, only its output does.",
        AgentToolParameters::object()
            .string("command", "The shell command to execute", true)
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let command = args.get_str("command")?;
            let output = shell_command(command)
                .current_dir(&ctx.working_directory)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await;

            Ok(match output {
                Ok(output) => format_command_output(
                    output.status.code(),
                    &String::from_utf8_lossy(&output.stdout),
                    &String::from_utf8_lossy(&output.stderr),
                ),
                Err(error) => format!("[FAILED] {error}"),
            })
        },
    ))
}

fn number_lines(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut numbered: Vec<String> = lines
        .iter()
        .take(READ_FILE_MAX_LINES)
        .enumerate()
        .map(|(i, line)| format!("{:4}| {line}", i + 1))
        .collect();
    if lines.len() > READ_FILE_MAX_LINES {
        numbered.push(format!(
            "... ({} more lines)",
            lines.len() - READ_FILE_MAX_LINES
        ));
    }
    numbered.join("\n")
}

/// Create the `read_file` tool: returns a file's text with line numbers.
pub fn read_file_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "read_file",
        "Read the contents of a text file, with line numbers",
        AgentToolParameters::object()
            .string(
                "file_path",
                "Path to the file (absolute or relative to the working directory)",
                true,
            )
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let file_path = args.get_str("file_path")?;
            let path = resolve_path(file_path, &ctx.working_directory);

            match tokio::fs::metadata(&path).await {
                Err(_) => return Ok(format!("[FAILED] File not found: {file_path}")),
                Ok(metadata) if !metadata.is_file() => {
                    return Ok(format!("[FAILED] Not a file: {file_path}"))
                }
                Ok(_) => {}
            }

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| SkillAgentError::tool("read_file", format!("{file_path}: {e}")))?;
            match String::from_utf8(bytes) {
                Ok(content) => Ok(format!("[OK]\n\n{}", number_lines(&content))),
                Err(_) => Ok(format!(
                    "[FAILED] Cannot read file (binary or unknown encoding): {file_path}"
                )),
            }
        },
    ))
}

/// Create the `write_file` tool: writes content, creating parent directories.
pub fn write_file_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "write_file",
        "Write content to a file, creating parent directories if needed",
        AgentToolParameters::object()
            .string(
                "file_path",
                "Path to the file (absolute or relative to the working directory)",
                true,
            )
            .string("content", "Content to write to the file", true)
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let file_path = args.get_str("file_path")?;
            let content = args.get_str("content")?;
            let path = resolve_path(file_path, &ctx.working_directory);

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    SkillAgentError::tool(
                        "write_file",
                        format!("failed to create directories for {file_path}: {e}"),
                    )
                })?;
            }
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| SkillAgentError::tool("write_file", format!("{file_path}: {e}")))?;

            Ok(format!("[OK]\n\nFile written: {}", path.display()))
        },
    ))
}

#[derive(Debug, Deserialize)]
struct EditArgs {
    file_path: String,
    old_string: String,
    new_string: String,
}

/// Create the `edit` tool: replaces one unique occurrence of a string in a file.
pub fn edit_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "edit",
        "Edit a file by replacing text. old_string must match exactly, including \
         whitespace, and must be unique in the file.",
        AgentToolParameters::object()
            .string("file_path", "Path to the file to edit", true)
            .string("old_string", "The exact text to find and replace", true)
            .string("new_string", "The text to replace it with", true)
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let EditArgs {
                file_path,
                old_string,
                new_string,
            } = args.deserialize()?;
            if old_string.is_empty() {
                return Ok("[FAILED] old_string must not be empty.".to_string());
            }

            let path = resolve_path(&file_path, &ctx.working_directory);
            match tokio::fs::metadata(&path).await {
                Err(_) => return Ok(format!("[FAILED] File not found: {file_path}")),
                Ok(metadata) if !metadata.is_file() => {
                    return Ok(format!("[FAILED] Not a file: {file_path}"))
                }
                Ok(_) => {}
            }

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(error) if error.kind() == std::io::ErrorKind::InvalidData => {
                    return Ok(format!(
                        "[FAILED] Cannot edit file (binary or unknown encoding): {file_path}"
                    ))
                }
                Err(error) => return Err(SkillAgentError::tool("edit", error.to_string())),
            };

            match content.matches(old_string.as_str()).count() {
                0 => {
                    return Ok("[FAILED] String not found in file. Make sure the text matches \
                               exactly including whitespace."
                        .to_string())
                }
                1 => {}
                count => {
                    return Ok(format!(
                        "[FAILED] String appears {count} times in file. Please provide more \
                         context to make it unique."
                    ))
                }
            }

            tokio::fs::write(&path, content.replacen(&old_string, &new_string, 1))
                .await
                .map_err(|e| SkillAgentError::tool("edit", format!("{file_path}: {e}")))?;

            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or(file_path);
            Ok(format!(
                "[OK]\n\nEdited {name}: replaced {} lines with {} lines",
                old_string.split('\n').count(),
                new_string.split('\n').count()
            ))
        },
    ))
}

fn glob_files(root: &Path, pattern: &str) -> String {
    let mut builder = OverrideBuilder::new(root);
    let overrides = match builder.add(pattern).and_then(|builder| builder.build()) {
        Ok(overrides) => overrides,
        Err(error) => return format!("[FAILED] Invalid glob pattern: {error}"),
    };

    let mut matches: Vec<String> = walker(root, true)
        .overrides(overrides)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
        .map(|entry| display_relative(entry.path(), root))
        .collect();
    matches.sort();

    if matches.is_empty() {
        return format!("No files matching pattern: {pattern}");
    }

    let mut output = matches
        .iter()
        .take(GLOB_MAX_RESULTS)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if matches.len() > GLOB_MAX_RESULTS {
        output.push_str(&format!(
            "\n... and {} more files",
            matches.len() - GLOB_MAX_RESULTS
        ));
    }
    format!("[OK]\n\n{output}")
}

/// Create the `glob` tool: lists files under the working directory matching a glob.
pub fn glob_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "glob",
        "Find files matching a glob pattern (e.g. \"**/*.rs\", \"src/**/*.ts\", \"*.md\")",
        AgentToolParameters::object()
            .string("pattern", "Glob pattern to match", true)
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let pattern = args.get_str("pattern")?.to_string();
            let root = ctx.working_directory.clone();
            tokio::task::spawn_blocking(move || glob_files(&root, &pattern))
                .await
                .map_err(|e| SkillAgentError::tool("glob", e.to_string()))
        },
    ))
}

fn grep_files(cwd: &Path, search_path: &Path, pattern: &str) -> String {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => return format!("[FAILED] Invalid regex pattern: {error}"),
    };
    if !search_path.exists() {
        return format!("[FAILED] Path not found: {}", search_path.display());
    }

    let mut files: Vec<PathBuf> = if search_path.is_file() {
        vec![search_path.to_path_buf()]
    } else {
        walker(search_path, false)
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
            .map(DirEntry::into_path)
            .collect()
    };
    files.sort();

    let mut results = Vec::new();
    let mut files_searched = 0usize;
    'files: for file in &files {
        let Ok(bytes) = std::fs::read(file) else {
            continue;
        };
        files_searched += 1;
        let content = String::from_utf8_lossy(&bytes);
        for (index, line) in content.split('\n').enumerate() {
            if regex.is_match(line) {
                let text: String = line.trim().chars().take(GREP_LINE_MAX_CHARS).collect();
                results.push(format!("{}:{}: {text}", display_relative(file, cwd), index + 1));
                if results.len() >= GREP_MAX_MATCHES {
                    break 'files;
                }
            }
        }
    }

    if results.is_empty() {
        return format!("No matches found for pattern: {pattern} (searched {files_searched} files)");
    }
    let mut output = results.join("\n");
    if results.len() >= GREP_MAX_MATCHES {
        output.push_str(&format!(
            "\n... (truncated, showing first {GREP_MAX_MATCHES} matches)"
        ));
    }
    format!("[OK]\n\n{output}")
}

/// Create the `grep` tool: regex search over files, skipping hidden and vendored dirs.
pub fn grep_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "grep",
        "Search for a regular expression in files",
        AgentToolParameters::object()
            .string("pattern", "Regular expression pattern to search for", true)
            .string(
                "path",
                "File or directory to search in (defaults to '.')",
                false,
            )
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let pattern = args.get_str("pattern")?.to_string();
            let cwd = ctx.working_directory.clone();
            let search_path = resolve_path(args.get_str_opt("path").unwrap_or("."), &cwd);
            tokio::task::spawn_blocking(move || grep_files(&cwd, &search_path, &pattern))
                .await
                .map_err(|e| SkillAgentError::tool("grep", e.to_string()))
        },
    ))
}

fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{size}B")
    } else if size < 1024 * 1024 {
        format!("{}KB", size / 1024)
    } else {
        format!("{}MB", size / (1024 * 1024))
    }
}

/// Create the `list_dir` tool: directories first, then files with sizes.
pub fn list_dir_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "list_dir",
        "List the contents of a directory",
        AgentToolParameters::object()
            .string(
                "path",
                "Directory path (defaults to '.', the working directory)",
                false,
            )
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let path_arg = args.get_str_opt("path").unwrap_or(".");
            let dir = resolve_path(path_arg, &ctx.working_directory);

            match tokio::fs::metadata(&dir).await {
                Err(_) => return Ok(format!("[FAILED] Directory not found: {path_arg}")),
                Ok(metadata) if !metadata.is_dir() => {
                    return Ok(format!("[FAILED] Not a directory: {path_arg}"))
                }
                Ok(_) => {}
            }

            let list_error = |e: std::io::Error| SkillAgentError::tool("list_dir", format!("{path_arg}: {e}"));
            let mut read_dir = tokio::fs::read_dir(&dir).await.map_err(list_error)?;
            let mut entries = Vec::new();
            while let Some(entry) = read_dir.next_entry().await.map_err(list_error)? {
                let metadata = entry.metadata().await.map_err(list_error)?;
                entries.push((
                    metadata.is_dir(),
                    entry.file_name().to_string_lossy().into_owned(),
                    metadata.len(),
                ));
            }
            entries.sort_by(|a, b| {
                b.0.cmp(&a.0)
                    .then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase()))
            });

            if entries.is_empty() {
                return Ok("[OK]\n\n(empty directory)".to_string());
            }

            let mut lines: Vec<String> = entries
                .iter()
                .take(LIST_DIR_MAX_ENTRIES)
                .map(|(is_dir, name, size)| {
                    if *is_dir {
                        format!("📁 {name}/")
                    } else {
                        format!("   {name} ({})", format_size(*size))
                    }
                })
                .collect();
            if entries.len() > LIST_DIR_MAX_ENTRIES {
                lines.push(format!(
                    "... and {} more entries",
                    entries.len() - LIST_DIR_MAX_ENTRIES
                ));
            }
            Ok(format!("[OK]\n\n{}", lines.join("\n")))
        },
    ))
}

/// Return every built-in tool.
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        load_skill_tool(),
        bash_tool(),
        read_file_tool(),
        write_file_tool(),
        edit_tool(),
        glob_tool(),
        grep_tool(),
        list_dir_tool(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_output_marks_success_and_failure() {
        assert_eq!(format_command_output(Some(0), "hi\n", ""), "[OK]\n\nhi");
        assert_eq!(
            format_command_output(Some(2), "out", "bad\n"),
            "[FAILED] Exit code: 2\n\nout\n\n--- stderr ---\nbad"
        );
        assert_eq!(
            format_command_output(Some(1), "", "boom"),
            "[FAILED] Exit code: 1\n\n--- stderr ---\nboom"
        );
        assert_eq!(format_command_output(Some(0), "", ""), "[OK]\n\n(no output)");
    }

    #[test]
    fn number_lines_pads_and_caps() {
        assert_eq!(number_lines("a\nb"), "   1| a\n   2| b");
        let long = vec!["x"; READ_FILE_MAX_LINES + 3].join("\n");
        assert!(number_lines(&long).ends_with("... (3 more lines)"));
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(10), "10B");
        assert_eq!(format_size(2048), "2KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3MB");
    }

    #[test]
    fn skill_not_found_lists_available_names() {
        assert_eq!(
            format_skill_not_found("x", &["a".into(), "b".into()]),
            "[FAILED] Skill 'x' not found. Available skills: a, b"
        );
        assert!(format_skill_not_found("x", &[]).ends_with("No skills are currently available."));
    }

    #[test]
    fn all_tools_have_unique_names_and_object_schemas() {
        let tools = all_tools();
        let mut names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
        for tool in &tools {
            assert!(!tool.description().is_empty());
            assert_eq!(tool.parameters().schema["type"], "object");
        }
    }
}
