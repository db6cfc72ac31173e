//! Memory read tool: reads notes from the configured memory directory.

use serde_json::Value;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use warden_core::ToolKind;
use warden_workspace::{Access, is_within, normalize_path};

use crate::context::{CallContext, ToolContext};
use crate::contract::{Tool, ToolOutput, ToolStream, once_result, optional_str};
use crate::error::{ToolError, ToolResult};
use crate::truncate::truncate_output;

/// Name of the file whose contents accompany a listing.
const INDEX_FILE: &str = "index.md";

/// Built-in tool for reading persistent memory.
pub struct MemoryReadTool;

impl MemoryReadTool {
    fn memory_dir(ctx: &ToolContext) -> ToolResult<&Path> {
        ctx.memory_dir
            .as_deref()
            .ok_or_else(|| ToolError::InvalidArguments("memory directory is not configured".into()))
    }

    /// Resolve `path` inside the memory directory.
    fn resolve(ctx: &ToolContext, path: &str) -> ToolResult<PathBuf> {
        let dir = Self::memory_dir(ctx)?;
        let base = normalize_path(dir, dir);
        let target = normalize_path(dir, Path::new(path));
        if is_within(&base, &target) {
            Ok(dir.join(path))
        } else {
            Err(ToolError::OutsideBoundary {
                access: Access::Read,
                path: PathBuf::from(path),
            })
        }
    }
}

#[async_trait::async_trait]
impl Tool for MemoryReadTool {
    fn name(&self) -> &str {
        "memory_read"
    }

    fn description(&self) -> &str {
        "Reads saved memory. Without a path, lists the memory files and shows index.md. \
         With a path (relative to the memory directory), returns that file's contents."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Memory file to read, relative to the memory directory"
                }
            }
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Memory
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn is_concurrency_safe(&self) -> bool {
        true
    }

    async fn validate_input(&self, input: &Value, ctx: &ToolContext) -> ToolResult<()> {
        match optional_str(input, "path") {
            Some(path) => Self::resolve(ctx, path).map(drop),
            None => Self::memory_dir(ctx).map(drop),
        }
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        once_result(async move {
            let max = ctx.env.max_output_chars;
            if let Some(path) = optional_str(&input, "path") {
                let target = Self::resolve(&ctx.env, path)?;
                let content = match tokio::fs::read_to_string(&target).await {
                    Ok(content) => content,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(ToolError::PathNotFound(path.to_string()));
                    },
                    Err(e) => return Err(e.into()),
                };
                return Ok(ToolOutput::new(
                    serde_json::json!({ "path": path, "bytes": content.len() }),
                    truncate_output(content, max),
                ));
            }

            let dir = Self::memory_dir(&ctx.env)?.to_path_buf();
            let listing = dir.clone();
            let files = tokio::task::spawn_blocking(move || list_memory_files(&listing))
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("memory listing panicked: {e}")))?;

            if files.is_empty() {
                return Ok(ToolOutput::new(
                    serde_json::json!({ "files": [] }),
                    "(memory is empty)",
                ));
            }

            let mut text = String::from("Memory files:\n");
            for file in &files {
                let _ = writeln!(text, "  {file}");
            }
            if files.iter().any(|f| f == INDEX_FILE)
                && let Ok(index) = tokio::fs::read_to_string(dir.join(INDEX_FILE)).await
            {
                let _ = write!(text, "\n--- {INDEX_FILE} ---\n{index}");
            }

            Ok(ToolOutput::new(
                serde_json::json!({ "files": files }),
                truncate_output(text, max),
            ))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        match optional_str(input, "path") {
            Some(path) => format!("Read memory {path}"),
            None => "Read memory".to_string(),
        }
    }
}

/// Relative paths of all non-hidden files under `dir`, sorted.
fn list_memory_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name().to_str().is_none_or(|s| !s.starts_with('.')))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|rel| rel.to_string_lossy().into_owned())
        })
        .collect();
    files.sort();
    files
}
