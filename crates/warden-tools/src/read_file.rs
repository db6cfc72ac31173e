//! Read file tool: reads a file with line numbers (cat -n style).

use serde_json::Value;
use std::fmt::Write;
use warden_core::ToolKind;
use warden_vfs::ReadOptions;
use warden_workspace::Access;

use crate::contract::{Tool, ToolOutput, ToolStream, once_result, optional_usize, required_str};
use crate::context::{CallContext, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::truncate::{truncate_at_char_boundary, truncate_output};

/// Default maximum lines to read.
const DEFAULT_LINE_LIMIT: usize = 2000;
/// Maximum line length before truncation.
const MAX_LINE_LENGTH: usize = 2000;

/// Built-in tool for reading files.
pub struct ReadFileTool;

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a file from the workspace. Returns contents with line numbers (cat -n format). \
         Default reads up to 2000 lines. Use offset and limit for large files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to read (absolute or workspace-relative)"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-based)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Number of lines to read"
                }
            },
            "required": ["file_path"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::FileRead
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn is_concurrency_safe(&self) -> bool {
        true
    }

    async fn validate_input(&self, input: &Value, ctx: &ToolContext) -> ToolResult<()> {
        let file_path = required_str(input, "file_path")?;
        ctx.check_access(Access::Read, file_path)?;
        Ok(())
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        once_result(async move {
            let file_path = required_str(&input, "file_path")?;
            let path = ctx.env.check_access(Access::Read, file_path)?;
            let offset = optional_usize(&input, "offset");
            let limit = optional_usize(&input, "limit").unwrap_or(DEFAULT_LINE_LIMIT);

            let file = ctx.env.files.read_file(&path, ReadOptions::default()).await?;
            if file.content.contains('\0') {
                return Err(ToolError::InvalidArguments(format!(
                    "{file_path} appears to be a binary file"
                )));
            }

            let (text, shown) = number_lines(&file.content, offset, limit);
            Ok(ToolOutput::new(
                serde_json::json!({
                    "file_path": path.display().to_string(),
                    "size": file.metadata.size,
                    "lines": shown,
                    "total_lines": file.content.lines().count(),
                }),
                truncate_output(text, ctx.env.max_output_chars),
            ))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        let file_path = input.get("file_path").and_then(Value::as_str).unwrap_or("");
        format!("Read {file_path}")
    }

    fn render_result(&self, output: &ToolOutput) -> String {
        let lines = output.data.get("lines").and_then(Value::as_u64).unwrap_or(0);
        format!("Read {lines} lines")
    }
}

/// Render `content` in cat -n style starting at the 1-based `offset`.
///
/// Returns the text and the number of lines shown.
fn number_lines(content: &str, offset: Option<usize>, limit: usize) -> (String, usize) {
    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();
    let start = offset.map_or(0, |o| o.saturating_sub(1));
    let end = start.saturating_add(limit).min(total_lines);

    if start >= total_lines {
        return (
            format!("(file has {total_lines} lines, offset {start} is past end)"),
            0,
        );
    }

    let mut output = String::new();
    for (line_num, line) in (start.saturating_add(1)..).zip(lines.get(start..end).unwrap_or_default()) {
        let display_line = truncate_at_char_boundary(line, MAX_LINE_LENGTH);
        let _ = writeln!(output, "{line_num:>6}\t{display_line}");
    }

    if end < total_lines {
        let _ = write!(
            output,
            "\n(showing lines {}-{end} of {total_lines}; use offset/limit for more)",
            start.saturating_add(1),
        );
    }

    (output, end.saturating_sub(start))
}
