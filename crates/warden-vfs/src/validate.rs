//! Stateless path and file name checks.

use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

use crate::error::{SandboxCode, VfsError, VfsResult};
use crate::policy::MAX_FILE_NAME_LENGTH;

static SHELL_EXPANSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").expect("invalid regex"));

const SHELL_METACHARACTERS: &[char] = &['`', '|', ';', '&', '>', '<', '\0'];

const RESERVED_CHARACTERS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Run the lexical part of path validation: length, home shortcut, shell patterns.
///
/// # Errors
///
/// Returns `too_long`, `traversal` or `suspicious_pattern`.
pub fn check_path_syntax(path: &Path, max_len: usize) -> VfsResult<()> {
    let raw = path.to_string_lossy();

    if raw.len() > max_len {
        return Err(VfsError::rejected(
            SandboxCode::TooLong,
            format!("Path exceeds maximum length of {max_len} characters"),
        ));
    }

    let home_shortcut = path.components().any(|c| match c {
        Component::Normal(part) => part.to_string_lossy().starts_with('~'),
        _ => false,
    });
    if home_shortcut {
        return Err(VfsError::rejected(
            SandboxCode::Traversal,
            "Home directory shortcuts are not allowed in paths",
        ));
    }

    if raw.contains(SHELL_METACHARACTERS) || SHELL_EXPANSION.is_match(&raw) {
        return Err(VfsError::rejected(
            SandboxCode::SuspiciousPattern,
            "Path contains suspicious characters",
        ));
    }

    Ok(())
}

/// Validate a single file name (no directory separators).
///
/// # Errors
///
/// Returns `invalid_file_name` for empty or overlong names, reserved
/// characters, reserved device names, and names that start or end with a
/// dot or whitespace.
pub fn validate_file_name(name: &str) -> VfsResult<()> {
    let invalid = |message: &str| Err(VfsError::rejected(SandboxCode::InvalidFileName, message));

    if name.is_empty() {
        return invalid("File name cannot be empty");
    }
    if name.len() > MAX_FILE_NAME_LENGTH {
        return invalid("File name is too long");
    }
    if name.contains(RESERVED_CHARACTERS) || name.chars().any(char::is_control) {
        return invalid("File name contains reserved characters");
    }

    let stem = name.split('.').next().unwrap_or(name);
    if RESERVED_DEVICE_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        return invalid("File name is a reserved device name");
    }

    let edge = |c: char| c == '.' || c.is_whitespace();
    if name.starts_with(edge) || name.ends_with(edge) {
        return invalid("File name cannot start or end with a dot or whitespace");
    }

    Ok(())
}
