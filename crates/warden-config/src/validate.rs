//! Post-merge configuration validation.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, PERMISSION_MODES};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::Invalid`] found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_workspace(config)?;
    validate_permissions(config)?;
    validate_sandbox(config)?;
    validate_logging(config)?;
    validate_tools(config)?;
    Ok(())
}

fn require_absolute(field: &str, paths: &[PathBuf]) -> ConfigResult<()> {
    match paths.iter().find(|p| !p.is_absolute()) {
        Some(path) => Err(ConfigError::invalid(
            field,
            format!("'{}' must be an absolute path", path.display()),
        )),
        None => Ok(()),
    }
}

fn validate_workspace(config: &Config) -> ConfigResult<()> {
    let ws = &config.workspace;
    if let Some(root) = &ws.root
        && !root.is_absolute()
    {
        return Err(ConfigError::invalid(
            "workspace.root",
            format!("'{}' must be an absolute path", root.display()),
        ));
    }
    require_absolute("workspace.read_dirs", &ws.read_dirs)?;
    require_absolute("workspace.write_dirs", &ws.write_dirs)
}

fn validate_permissions(config: &Config) -> ConfigResult<()> {
    let mode = config.permissions.default_mode.as_str();
    if !PERMISSION_MODES.contains(&mode) {
        return Err(ConfigError::invalid(
            "permissions.default_mode",
            format!(
                "unknown permission mode '{mode}'; expected one of: {}",
                PERMISSION_MODES.join(", ")
            ),
        ));
    }
    if config
        .permissions
        .session_allowed_tools
        .iter()
        .any(|t| t.trim().is_empty())
    {
        return Err(ConfigError::invalid(
            "permissions.session_allowed_tools",
            "tool names must not be empty",
        ));
    }
    Ok(())
}

fn validate_sandbox(config: &Config) -> ConfigResult<()> {
    let s = &config.sandbox;
    require_absolute("sandbox.base_paths", &s.base_paths)?;
    if s.max_file_size == 0 {
        return Err(ConfigError::invalid("sandbox.max_file_size", "must be greater than 0"));
    }
    if s.max_write_size == 0 {
        return Err(ConfigError::invalid("sandbox.max_write_size", "must be greater than 0"));
    }
    if s.max_path_length == 0 {
        return Err(ConfigError::invalid("sandbox.max_path_length", "must be greater than 0"));
    }
    if let Some(ext) = s
        .allowed_extensions
        .iter()
        .find(|e| e.is_empty() || e.contains(['/', '\\']))
    {
        return Err(ConfigError::invalid(
            "sandbox.allowed_extensions",
            format!("'{ext}' is not a valid extension"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !LOG_LEVELS.contains(&l.level.to_lowercase().as_str()) {
        return Err(ConfigError::invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: {}",
                l.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }
    if !LOG_FORMATS.contains(&l.format.to_lowercase().as_str()) {
        return Err(ConfigError::invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }
    Ok(())
}

fn validate_tools(config: &Config) -> ConfigResult<()> {
    let t = &config.tools;
    if t.shell_timeout_ms == 0 {
        return Err(ConfigError::invalid("tools.shell_timeout_ms", "must be greater than 0"));
    }
    if t.max_output_chars == 0 {
        return Err(ConfigError::invalid("tools.max_output_chars", "must be greater than 0"));
    }
    if let Some(dir) = &t.memory_dir
        && !dir.is_absolute()
    {
        return Err(ConfigError::invalid(
            "tools.memory_dir",
            format!("'{}' must be an absolute path", dir.display()),
        ));
    }
    Ok(())
}
