//! Configuration types for the Warden control plane.
//!
//! All types are self-contained with no dependencies on other internal
//! warden crates; the runtime converts them into domain types once, at
//! session bootstrap. Every struct implements [`Default`] so that a bare
//! `[section]` header in TOML produces a working configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace root and extra granted directories.
    pub workspace: WorkspaceSection,
    /// Initial permission mode and persisted approvals.
    pub permissions: PermissionsSection,
    /// File service limits.
    pub sandbox: SandboxSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
    /// Built-in tool settings.
    pub tools: ToolsSection,
}

// ---------------------------------------------------------------------------
// WorkspaceSection
// ---------------------------------------------------------------------------

/// Directories the session may read and write.
///
/// The workspace root is always granted for both; the lists add to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Project root. Filled from the directory passed to the loader when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Extra absolute directories granted for reading.
    pub read_dirs: Vec<PathBuf>,
    /// Extra absolute directories granted for writing.
    pub write_dirs: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// PermissionsSection
// ---------------------------------------------------------------------------

/// Accepted values of `permissions.default_mode`.
pub const PERMISSION_MODES: &[&str] = &["default", "acceptEdits", "plan", "bypassPermissions"];

/// Permission settings applied at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsSection {
    /// Mode the session starts in.
    pub default_mode: String,
    /// Tools approved for the whole session without prompting.
    pub session_allowed_tools: Vec<String>,
}

impl Default for PermissionsSection {
    fn default() -> Self {
        Self {
            default_mode: "default".to_owned(),
            session_allowed_tools: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SandboxSection
// ---------------------------------------------------------------------------

/// File service limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    /// Extra absolute base directories beyond the workspace root.
    pub base_paths: Vec<PathBuf>,
    /// Extensions added to the built-in allow-list (without the dot).
    pub allowed_extensions: Vec<String>,
    /// Whether files without an extension may be read and written.
    pub allow_extensionless: bool,
    /// Read cap in bytes.
    pub max_file_size: u64,
    /// Write cap in bytes.
    pub max_write_size: u64,
    /// Maximum path length in bytes.
    pub max_path_length: usize,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            base_paths: Vec::new(),
            allowed_extensions: Vec::new(),
            allow_extensionless: true,
            max_file_size: 10_485_760,
            max_write_size: 5_242_880,
            max_path_length: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["warden_vfs=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolsSection
// ---------------------------------------------------------------------------

/// Built-in tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// Default shell command timeout in milliseconds.
    pub shell_timeout_ms: u64,
    /// Assistant-facing output ceiling in characters.
    pub max_output_chars: usize,
    /// Directory served by `memory_read`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_dir: Option<PathBuf>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            shell_timeout_ms: 120_000,
            max_output_chars: 30_000,
            memory_dir: None,
        }
    }
}
