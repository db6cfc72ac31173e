//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_config::prelude::*;` to import all essential types.

pub use crate::{Config, ConfigError, ConfigResult, LoadedConfig};

pub use crate::{LoggingSection, PermissionsSection, SandboxSection, ToolsSection, WorkspaceSection};
