//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.warden/config.toml` (user)
//! 3. Merge `{workspace}/.warden/config.toml` (workspace)
//! 4. Deserialize merged tree → `Config`, fill `workspace.root`
//! 5. Validate

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Name of the per-user and per-workspace config directory.
pub const CONFIG_DIR: &str = ".warden";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// A loaded configuration and the files that contributed to it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged, validated configuration.
    pub config: Config,
    /// Files merged on top of the embedded defaults, in order.
    pub loaded_files: Vec<PathBuf>,
}

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the root of the current project. If `None`, the
/// workspace layer is skipped. `home_override` names the user config
/// directory itself (it replaces `~/.warden`).
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(workspace_root: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<LoadedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    let user_dir = match home_override {
        Some(dir) => dir.to_path_buf(),
        None => home_directory()?.join(CONFIG_DIR),
    };
    let user_path = user_dir.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, &overlay);
        info!(path = %user_path.display(), "loaded user config");
        loaded_files.push(user_path);
    }

    if let Some(ws_root) = workspace_root {
        let ws_path = ws_root.join(CONFIG_DIR).join("config.toml");
        if let Some(overlay) = try_load_file(&ws_path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %ws_path.display(), "loaded workspace config");
            loaded_files.push(ws_path);
        }
    }

    let mut config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;
    if config.workspace.root.is_none() {
        config.workspace.root = workspace_root.map(Path::to_path_buf);
    }

    validate::validate(&config)?;
    Ok(LoadedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = read_limited(path)?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Parse the embedded defaults.
///
/// # Errors
///
/// Returns a [`ConfigError::ParseError`] if the embedded file is malformed.
pub fn defaults() -> ConfigResult<Config> {
    toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
        path: "<embedded defaults>".to_owned(),
        source: e,
    })
}

fn read_limited(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::invalid(
            &path.display().to_string(),
            format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        ));
    }
    Ok(content)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match read_limited(path) {
        Ok(c) => c,
        Err(ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => return Err(e),
    };

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("config.toml"), body).unwrap();
    }

    #[test]
    fn test_defaults_match_type_defaults() {
        assert_eq!(defaults().unwrap(), Config::default());
    }

    #[test]
    fn test_load_without_files() {
        let home = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        let loaded = load(Some(ws.path()), Some(home.path())).unwrap();
        assert!(loaded.loaded_files.is_empty());
        assert_eq!(loaded.config.workspace.root.as_deref(), Some(ws.path()));
        assert_eq!(loaded.config.permissions.default_mode, "default");
    }

    #[test]
    fn test_workspace_overrides_user() {
        let home = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write_config(
            home.path(),
            "[permissions]\ndefault_mode = \"acceptEdits\"\n[tools]\nmax_output_chars = 500\n",
        );
        write_config(
            &ws.path().join(CONFIG_DIR),
            "[permissions]\ndefault_mode = \"plan\"\n",
        );

        let loaded = load(Some(ws.path()), Some(home.path())).unwrap();
        assert_eq!(loaded.loaded_files.len(), 2);
        assert_eq!(loaded.config.permissions.default_mode, "plan");
        assert_eq!(loaded.config.tools.max_output_chars, 500);
        assert_eq!(loaded.config.tools.shell_timeout_ms, 120_000);
    }

    #[test]
    fn test_invalid_merge_rejected() {
        let home = TempDir::new().unwrap();
        write_config(home.path(), "[sandbox]\nmax_file_size = 0\n");
        let err = load(None, Some(home.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "sandbox.max_file_size"));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let home = TempDir::new().unwrap();
        write_config(home.path(), "[permissions\n");
        let err = load(None, Some(home.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
