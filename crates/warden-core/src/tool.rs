//! Tool descriptors: the static facts the permission engine decides on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad capability class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Shell command execution.
    Shell,
    /// Reading files.
    FileRead,
    /// Creating or modifying files.
    FileEdit,
    /// Searching the workspace (glob, grep).
    Search,
    /// Reading agent memory.
    Memory,
    /// Tool served by an external tool server.
    External,
    /// Session control (e.g. leaving plan mode).
    Control,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell => write!(f, "shell"),
            Self::FileRead => write!(f, "file_read"),
            Self::FileEdit => write!(f, "file_edit"),
            Self::Search => write!(f, "search"),
            Self::Memory => write!(f, "memory"),
            Self::External => write!(f, "external"),
            Self::Control => write!(f, "control"),
        }
    }
}

/// Static description of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Registry name.
    pub name: String,
    /// Capability class.
    pub kind: ToolKind,
    /// Whether the tool never mutates state.
    pub read_only: bool,
    /// Whether the tool may run alongside other concurrency-safe tools.
    pub concurrency_safe: bool,
}

impl ToolDescriptor {
    /// Create a descriptor for a mutating, exclusive tool.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            read_only: false,
            concurrency_safe: false,
        }
    }

    /// Mark the tool read-only. Read-only tools are concurrency-safe.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self.concurrency_safe = true;
        self
    }

    /// Mark a mutating tool as safe to run concurrently.
    #[must_use]
    pub fn concurrency_safe(mut self) -> Self {
        self.concurrency_safe = true;
        self
    }

    /// Whether this tool edits files (the `acceptEdits` class).
    #[must_use]
    pub fn is_file_edit(&self) -> bool {
        self.kind == ToolKind::FileEdit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_exclusive() {
        let desc = ToolDescriptor::new("bash", ToolKind::Shell);
        assert!(!desc.read_only);
        assert!(!desc.concurrency_safe);
    }

    #[test]
    fn test_read_only_implies_concurrency_safe() {
        let desc = ToolDescriptor::new("grep", ToolKind::Search).read_only();
        assert!(desc.read_only);
        assert!(desc.concurrency_safe);
    }

    #[test]
    fn test_file_edit_class() {
        assert!(ToolDescriptor::new("write_file", ToolKind::FileEdit).is_file_edit());
        assert!(!ToolDescriptor::new("bash", ToolKind::Shell).is_file_edit());
    }
}
