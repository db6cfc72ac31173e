//! Warden Tools - The tool contract, a static registry and the built-in tools.
//!
//! Every capability the agent can invoke implements [`Tool`]: it classifies
//! itself (read-only, concurrency-safe, needs permissions), validates input
//! without side effects, and produces a lazy [`ToolStream`] of progress
//! events ending in one [`ToolOutput`].
//!
//! Built-ins (`bash`, `read_file`, `write_file`, `edit_file`, `glob`,
//! `grep`, `memory_read`, `exit_plan_mode`) run in-process. Tools of
//! external servers are wrapped by [`McpTool`] and named `server:tool`.
//! File access goes through the session's [`warden_workspace::PathBoundary`]
//! and [`warden_vfs::SecureFileService`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bash;
mod context;
mod contract;
mod edit_file;
mod error;
mod exit_plan_mode;
mod glob;
mod grep;
mod mcp;
mod memory_read;
mod read_file;
mod registry;
mod truncate;
mod write_file;

pub use bash::BashTool;
pub use context::{CallContext, DEFAULT_MAX_OUTPUT_CHARS, DEFAULT_SHELL_TIMEOUT, ToolContext};
pub use contract::{
    Tool, ToolEvent, ToolOutput, ToolStream, once_result, optional_str, optional_usize,
    required_str,
};
pub use edit_file::EditFileTool;
pub use error::{ToolError, ToolResult};
pub use exit_plan_mode::ExitPlanModeTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use mcp::{McpCallResult, McpContent, McpTool, McpToolClient, McpToolDefinition};
pub use memory_read::MemoryReadTool;
pub use read_file::ReadFileTool;
pub use registry::{ToolDefinition, ToolRegistry};
pub use truncate::{truncate_at_char_boundary, truncate_output};
pub use write_file::WriteFileTool;
