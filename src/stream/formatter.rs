//! Success/failure classification and truncation of tool output text.
//!
//! Tools report through a plain-text convention: output starts with [`SUCCESS_PREFIX`] or
//! [`FAILURE_PREFIX`]. Arbitrary script output without either marker is treated as success.

use strum::{Display, EnumString};

pub const SUCCESS_PREFIX: &str = "[OK]";
pub const FAILURE_PREFIX: &str = "[FAILED]";
pub const TRUNCATION_SUFFIX: &str = "\n... (truncated)";

/// Length limits used when rendering tool activity.
pub struct DisplayLimits;

impl DisplayLimits {
    pub const THINKING_STREAM: usize = 1000;
    pub const TOOL_RESULT_STREAM: usize = 500;
    /// Bound on what re-enters the model context.
    pub const TOOL_RESULT_MAX: usize = 2000;
}

const ERROR_PATTERNS: [&str; 3] = ["Traceback (most recent call last)", "Exception:", "Error:"];
const MARKDOWN_PATTERNS: [&str; 4] = ["```", "**", "##", "- **"];

/// Outcome of classifying one tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub ok: bool,
    /// Output with the status marker removed, bounded by [`DisplayLimits::TOOL_RESULT_MAX`].
    pub summary: String,
    pub truncated: bool,
}

/// Rendering hint for tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ContentType {
    Success,
    Error,
    Json,
    Markdown,
    Text,
}

/// Classify tool output by its leading status marker. Never fails.
pub fn classify(raw_output: &str) -> ToolOutcome {
    let trimmed = raw_output.trim();
    let (ok, body) = if let Some(rest) = trimmed.strip_prefix(SUCCESS_PREFIX) {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix(FAILURE_PREFIX) {
        (false, rest)
    } else {
        (true, trimmed)
    };

    let body = body.trim();
    let summary = truncate(body, DisplayLimits::TOOL_RESULT_MAX);
    ToolOutcome {
        ok,
        truncated: summary.len() != body.len(),
        summary,
    }
}

/// Whether output looks like an error even without a failure marker.
pub fn looks_like_error(content: &str) -> bool {
    ERROR_PATTERNS.iter().any(|pattern| content.contains(pattern))
}

/// Detect how output should be rendered. Status markers take priority.
pub fn detect_content_type(content: &str) -> ContentType {
    let content = content.trim();

    if content.starts_with(SUCCESS_PREFIX) {
        if is_json(marker_body(content)) {
            return ContentType::Json;
        }
        return ContentType::Success;
    }
    if content.starts_with(FAILURE_PREFIX) {
        return ContentType::Error;
    }
    if is_json(content) {
        return ContentType::Json;
    }
    if looks_like_error(content) {
        return ContentType::Error;
    }
    if content.starts_with('#') || MARKDOWN_PATTERNS.iter().any(|p| content.contains(p)) {
        return ContentType::Markdown;
    }
    ContentType::Text
}

/// Text after the marker line and the blank line that follows it.
pub fn marker_body(content: &str) -> &str {
    let mut parts = content.splitn(3, '\n');
    parts.next();
    parts.next();
    parts.next().map(str::trim).unwrap_or("")
}

fn is_json(content: &str) -> bool {
    let content = content.trim();
    let bracketed = (content.starts_with('{') && content.ends_with('}'))
        || (content.starts_with('[') && content.ends_with(']'));
    bracketed && serde_json::from_str::<serde_json::Value>(content).is_ok()
}

/// Cut `content` to at most `max_chars` characters, appending [`TRUNCATION_SUFFIX`] when cut.
pub fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{TRUNCATION_SUFFIX}", &content[..end]),
        None => content.to_string(),
    }
}
