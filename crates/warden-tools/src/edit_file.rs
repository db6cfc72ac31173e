//! Edit file tool: performs exact string replacements in files.

use serde_json::Value;
use warden_core::ToolKind;
use warden_vfs::{ReadOptions, WriteOptions};
use warden_workspace::Access;

use crate::context::{CallContext, ToolContext};
use crate::contract::{Tool, ToolOutput, ToolStream, once_result, required_str};
use crate::error::{ToolError, ToolResult};

/// Built-in tool for editing files via string replacement.
pub struct EditFileTool;

impl EditFileTool {
    fn replace_all(input: &Value) -> bool {
        input
            .get("replace_all")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Performs exact string replacements in files. The old_string must be unique in the file \
         unless replace_all is true. Fails if old_string is not found or matches multiple times \
         (without replace_all)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to edit (absolute or workspace-relative)"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact text to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)",
                    "default": false
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::FileEdit
    }

    async fn validate_input(&self, input: &Value, ctx: &ToolContext) -> ToolResult<()> {
        let file_path = required_str(input, "file_path")?;
        let old_string = required_str(input, "old_string")?;
        let new_string = required_str(input, "new_string")?;
        if old_string.is_empty() {
            return Err(ToolError::InvalidArguments("old_string must not be empty".into()));
        }
        if old_string == new_string {
            return Err(ToolError::InvalidArguments(
                "old_string and new_string are identical".into(),
            ));
        }
        ctx.check_access(Access::Write, file_path)?;
        Ok(())
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        once_result(async move {
            let file_path = required_str(&input, "file_path")?;
            let old_string = required_str(&input, "old_string")?;
            let new_string = required_str(&input, "new_string")?;
            let replace_all = Self::replace_all(&input);
            let path = ctx.env.check_access(Access::Write, file_path)?;

            let file = ctx.env.files.read_file(&path, ReadOptions::default()).await?;
            if file.lossy {
                return Err(ToolError::InvalidArguments(format!(
                    "{file_path} is not valid UTF-8 text and cannot be edited"
                )));
            }
            let count = file.content.matches(old_string).count();

            if count == 0 {
                return Err(ToolError::InvalidArguments(format!(
                    "old_string not found in {file_path}"
                )));
            }
            if count > 1 && !replace_all {
                return Err(ToolError::InvalidArguments(format!(
                    "old_string found {count} times in {file_path}; use replace_all or provide more context to make it unique"
                )));
            }

            let new_content = if replace_all {
                file.content.replace(old_string, new_string)
            } else {
                file.content.replacen(old_string, new_string, 1)
            };

            ctx.env
                .files
                .write_file(&path, new_content, WriteOptions::default())
                .await?;

            let message = if count > 1 {
                format!("Replaced {count} occurrences in {file_path}")
            } else {
                format!("Edited {file_path}")
            };
            Ok(ToolOutput::new(
                serde_json::json!({
                    "file_path": path.display().to_string(),
                    "replacements": count,
                }),
                message,
            ))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        let file_path = input.get("file_path").and_then(Value::as_str).unwrap_or("");
        if Self::replace_all(input) {
            format!("Edit {file_path} (all occurrences)")
        } else {
            format!("Edit {file_path}")
        }
    }
}
