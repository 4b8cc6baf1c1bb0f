//! Resolution of tool-supplied paths against the working directory.

use std::path::{Path, PathBuf};

use directories::UserDirs;

/// Expand a leading `~` and anchor relative paths at `working_directory`.
pub fn resolve_path(file_path: &str, working_directory: &Path) -> PathBuf {
    let expanded = expand_home(file_path);
    if expanded.is_absolute() {
        expanded
    } else {
        working_directory.join(expanded)
    }
}

fn expand_home(file_path: &str) -> PathBuf {
    let rest = match file_path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => &rest[1..],
        _ => return PathBuf::from(file_path),
    };
    match UserDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => PathBuf::from(file_path),
    }
}

/// `path` relative to `base` when it lives under it, unchanged otherwise.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
