//! Layered configuration for the Warden control plane.
//!
//! # Usage
//!
//! ```rust,no_run
//! use warden_config::Config;
//!
//! let loaded = Config::load(Some(std::path::Path::new("/srv/project"))).unwrap();
//! println!("starting in {} mode", loaded.config.permissions.default_mode);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.warden/config.toml`)
//! 2. **User** (`~/.warden/config.toml`)
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! Tables merge per field; arrays and scalars from a higher layer replace
//! the lower value. Missing files are skipped.
//!
//! This crate has no dependencies on other internal warden crates.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered TOML merging.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_DIR, LoadedConfig};
pub use types::*;

use std::path::Path;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&Path>) -> ConfigResult<LoadedConfig> {
        loader::load(workspace_root, None)
    }

    /// Load configuration with an explicit user config directory.
    ///
    /// `home_dir` replaces `~/.warden`; `home_dir/config.toml` is read.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(workspace_root: Option<&Path>, home_dir: &Path) -> ConfigResult<LoadedConfig> {
        loader::load(workspace_root, Some(home_dir))
    }

    /// Load a single config file without layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or
    /// fails validation.
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error message if serialization fails.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }
}
