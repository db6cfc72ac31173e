//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_tools::prelude::*;` to import all essential types.

// Contract
pub use crate::{CallContext, Tool, ToolContext, ToolEvent, ToolOutput, ToolStream};

// Registry
pub use crate::{ToolDefinition, ToolRegistry};

// External tools
pub use crate::{McpTool, McpToolClient, McpToolDefinition};

// Errors
pub use crate::{ToolError, ToolResult};
