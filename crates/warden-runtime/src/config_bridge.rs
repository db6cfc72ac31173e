//! Bridge from `warden_config::Config` to domain types.
//!
//! The config crate has no dependencies on other internal crates; the
//! translation into boundary grants, file service policy, permission mode
//! and log settings happens here, once, at session bootstrap.

use std::path::{Path, PathBuf};
use std::time::Duration;

use warden_approval::PermissionMode;
use warden_config::Config;
use warden_telemetry::{LogConfig, LogFormat};
use warden_vfs::SandboxPolicy;
use warden_workspace::PathBoundary;

use crate::error::RuntimeResult;

/// Convert config to a [`LogConfig`].
///
/// Unknown formats fall back to compact; the config validator rejects them
/// before this point.
#[must_use]
pub fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg.logging.format.parse().unwrap_or(LogFormat::Compact);
    LogConfig::new(&cfg.logging.level)
        .with_format(format)
        .with_directives(cfg.logging.directives.iter().cloned())
}

/// Build the path boundary: the workspace root for both accesses plus the
/// configured extra directories.
#[must_use]
pub fn to_path_boundary(cfg: &Config, workspace_root: &Path) -> PathBoundary {
    let boundary = PathBoundary::with_root(workspace_root);
    for dir in &cfg.workspace.read_dirs {
        boundary.grant_read(dir);
    }
    for dir in &cfg.workspace.write_dirs {
        boundary.grant_read(dir);
        boundary.grant_write(dir);
    }
    boundary
}

/// Build the file service policy.
///
/// Base paths cover every directory the boundary grants, so the boundary
/// stays the single place that distinguishes reads from writes.
#[must_use]
pub fn to_sandbox_policy(cfg: &Config, workspace_root: &Path) -> SandboxPolicy {
    let mut base_paths: Vec<PathBuf> = vec![workspace_root.to_path_buf()];
    for dir in cfg
        .sandbox
        .base_paths
        .iter()
        .chain(&cfg.workspace.read_dirs)
        .chain(&cfg.workspace.write_dirs)
    {
        if !base_paths.contains(dir) {
            base_paths.push(dir.clone());
        }
    }

    let mut policy = SandboxPolicy {
        base_paths,
        allow_extensionless: cfg.sandbox.allow_extensionless,
        max_file_size: cfg.sandbox.max_file_size,
        max_write_size: cfg.sandbox.max_write_size,
        max_path_length: cfg.sandbox.max_path_length,
        ..SandboxPolicy::default()
    };
    for ext in &cfg.sandbox.allowed_extensions {
        policy.allow_extension(ext);
    }
    policy
}

/// Parse the initial permission mode.
///
/// # Errors
///
/// Returns an error if the mode name is unknown.
pub fn to_permission_mode(cfg: &Config) -> RuntimeResult<PermissionMode> {
    Ok(cfg.permissions.default_mode.parse()?)
}

/// Shell timeout from config.
#[must_use]
pub fn to_shell_timeout(cfg: &Config) -> Duration {
    Duration::from_millis(cfg.tools.shell_timeout_ms)
}
