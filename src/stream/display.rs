//! Compact one-line labels and tree previews for tool activity.

use std::path::Path;

use serde_json::{Map, Value};

fn arg_str<'a>(args: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn ellipsize(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let end = value
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    format!("{}...", &value[..end])
}

fn short_path(path: &str) -> String {
    if path.chars().count() <= 40 {
        return path.to_string();
    }
    let parts: Vec<String> = Path::new(path)
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.len() > 2 {
        format!(".../{}", parts[parts.len() - 2..].join("/"))
    } else {
        path.to_string()
    }
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Render a call as `Label(key argument)`, e.g. `Bash(git status)` or `Read(src/lib.rs)`.
pub fn format_tool_compact(name: &str, args: &Value) -> String {
    let args = match args.as_object() {
        Some(args) if !args.is_empty() => args,
        _ => return format!("{name}()"),
    };

    match name.to_lowercase().as_str() {
        "bash" => format!("Bash({})", ellipsize(arg_str(args, "command", ""), 50)),
        "read" | "read_file" => format!("Read({})", short_path(arg_str(args, "file_path", ""))),
        "write" | "write_file" => format!("Write({})", short_path(arg_str(args, "file_path", ""))),
        "edit" => format!("Edit({})", short_path(arg_str(args, "file_path", ""))),
        "glob" => format!("Glob({})", ellipsize(arg_str(args, "pattern", ""), 40)),
        "grep" => format!(
            "Grep({}, {})",
            ellipsize(arg_str(args, "pattern", ""), 30),
            arg_str(args, "path", ".")
        ),
        "list_dir" => format!("ListDir({})", arg_str(args, "path", ".")),
        "load_skill" => format!("Skill({})", arg_str(args, "skill_name", "")),
        _ => {
            let params = args
                .iter()
                .take(2)
                .map(|(key, value)| format!("{key}={}", ellipsize(&value_label(value), 20)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{name}({})", ellipsize(&params, 50))
        }
    }
}

/// Render output lines as an indented tree with a `... +N lines` hint.
///
/// ```text
///   └ On branch main
///     Your branch is up to date
///     ... +16 lines
/// ```
pub fn format_tree_output(lines: &[&str], max_lines: usize, indent: &str) -> String {
    if lines.is_empty() {
        return String::new();
    }

    let mut rendered: Vec<String> = lines
        .iter()
        .take(max_lines)
        .enumerate()
        .map(|(i, line)| {
            let prefix = if i == 0 { "└" } else { " " };
            format!("{indent}{prefix} {line}")
        })
        .collect();

    if lines.len() > max_lines {
        rendered.push(format!("{indent}  ... +{} lines", lines.len() - max_lines));
    }
    rendered.join("\n")
}
