//! Static registry of tools, built once at startup.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::bash::BashTool;
use crate::contract::Tool;
use crate::edit_file::EditFileTool;
use crate::exit_plan_mode::ExitPlanModeTool;
use crate::glob::GlobTool;
use crate::grep::GrepTool;
use crate::mcp::{McpTool, McpToolClient, McpToolDefinition};
use crate::memory_read::MemoryReadTool;
use crate::read_file::ReadFileTool;
use crate::write_file::WriteFileTool;

/// Tool definition exported to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Registry name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the input.
    pub input_schema: Value,
}

/// Registry of tools for lookup by name and definition export.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in tools registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReadFileTool));
        registry.register(Arc::new(WriteFileTool));
        registry.register(Arc::new(EditFileTool));
        registry.register(Arc::new(GlobTool));
        registry.register(Arc::new(GrepTool));
        registry.register(Arc::new(BashTool));
        registry.register(Arc::new(MemoryReadTool));
        registry.register(Arc::new(ExitPlanModeTool));
        registry
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "replaced an already registered tool");
        }
    }

    /// Register every tool of an external server.
    pub fn register_mcp<I>(&mut self, client: &Arc<dyn McpToolClient>, definitions: I)
    where
        I: IntoIterator<Item = McpToolDefinition>,
    {
        for definition in definitions {
            self.register(Arc::new(McpTool::new(definition, Arc::clone(client))));
        }
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a name refers to a built-in tool (no colon = built-in).
    #[must_use]
    pub fn is_builtin(name: &str) -> bool {
        !name.contains(':')
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Export all tool definitions for the model, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
