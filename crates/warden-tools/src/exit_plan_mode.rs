//! Exit plan mode tool: hands control back after the agent has presented a plan.

use serde_json::Value;
use warden_approval::PermissionMode;
use warden_core::ToolKind;

use crate::context::{CallContext, ToolContext};
use crate::contract::{Tool, ToolOutput, ToolStream, once_result, optional_str};
use crate::error::{ToolError, ToolResult};

/// Built-in tool that switches `plan` back to `default`.
pub struct ExitPlanModeTool;

#[async_trait::async_trait]
impl Tool for ExitPlanModeTool {
    fn name(&self) -> &str {
        "exit_plan_mode"
    }

    fn description(&self) -> &str {
        "Call this when you have finished planning and are ready to implement. \
         Presents the plan to the user and leaves plan mode."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "plan": {
                    "type": "string",
                    "description": "The plan to present to the user"
                }
            }
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Control
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn needs_permissions(&self, _input: &Value) -> bool {
        false
    }

    async fn validate_input(&self, _input: &Value, ctx: &ToolContext) -> ToolResult<()> {
        if ctx.modes.current_mode() == PermissionMode::Plan {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments("not in plan mode".into()))
        }
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        once_result(async move {
            if !ctx.env.modes.exit_plan_mode() {
                return Err(ToolError::InvalidArguments("not in plan mode".into()));
            }
            let plan = optional_str(&input, "plan").unwrap_or_default().to_string();
            let mode = ctx.env.modes.current_mode();
            Ok(ToolOutput::new(
                serde_json::json!({ "plan": plan, "mode": mode }),
                format!("Exited plan mode. Current mode: {}. Proceed with the plan.", mode.as_str()),
            ))
        })
    }

    fn render_tool_use_message(&self, _input: &Value) -> String {
        "Exit plan mode".to_string()
    }

    fn render_result(&self, output: &ToolOutput) -> String {
        output
            .data
            .get("plan")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map_or_else(|| "Plan approved".to_string(), |plan| format!("Plan:\n{plan}"))
    }
}
