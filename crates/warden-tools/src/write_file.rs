//! Write file tool: creates or overwrites a file through the file service.

use serde_json::Value;
use warden_core::ToolKind;
use warden_vfs::WriteOptions;
use warden_workspace::Access;

use crate::context::{CallContext, ToolContext};
use crate::contract::{Tool, ToolOutput, ToolStream, once_result, required_str};
use crate::error::ToolResult;

/// Built-in tool for writing files.
pub struct WriteFileTool;

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes content to a file. Creates the file and parent directories if they don't exist. \
         Overwrites the file if it already exists."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to write (absolute or workspace-relative)"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::FileEdit
    }

    async fn validate_input(&self, input: &Value, ctx: &ToolContext) -> ToolResult<()> {
        let file_path = required_str(input, "file_path")?;
        required_str(input, "content")?;
        ctx.check_access(Access::Write, file_path)?;
        Ok(())
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        once_result(async move {
            let file_path = required_str(&input, "file_path")?;
            let content = required_str(&input, "content")?;
            let path = ctx.env.check_access(Access::Write, file_path)?;

            let opts = WriteOptions {
                create_directory: true,
                ..WriteOptions::default()
            };
            let meta = ctx.env.files.write_file(&path, content, opts).await?;

            Ok(ToolOutput::new(
                serde_json::json!({
                    "file_path": path.display().to_string(),
                    "bytes": meta.size,
                }),
                format!("Wrote {} bytes to {file_path}", meta.size),
            ))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        let file_path = input.get("file_path").and_then(Value::as_str).unwrap_or("");
        format!("Write {file_path}")
    }
}
