//! Adapter exposing tools of external MCP servers through the tool contract.
//!
//! The transport to the server process lives behind [`McpToolClient`]; this
//! module only turns a server's tool definitions into [`Tool`]s that the
//! dispatcher can authorize, validate, run and cancel like any built-in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use warden_core::ToolKind;

use crate::context::{CallContext, ToolContext};
use crate::contract::{Tool, ToolOutput, ToolStream, once_result};
use crate::error::{ToolError, ToolResult};
use crate::truncate::truncate_output;

/// Definition of a tool offered by an external server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolDefinition {
    /// Tool name on the server.
    pub name: String,
    /// Server this tool belongs to.
    pub server: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// JSON Schema for input parameters.
    #[serde(default = "default_schema")]
    pub input_schema: Value,
    /// Server-declared hint that the tool has no side effects.
    #[serde(default)]
    pub read_only_hint: bool,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object"})
}

impl McpToolDefinition {
    /// Create a new tool definition.
    #[must_use]
    pub fn new(server: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            description: None,
            input_schema: default_schema(),
            read_only_hint: false,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Mark the tool read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only_hint = true;
        self
    }

    /// Registry name (`server:tool`).
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.server, self.name)
    }
}

/// Content returned by an external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpContent {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
    /// Image content.
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// Resource reference.
    Resource {
        /// Resource URI.
        uri: String,
        /// Inline resource data.
        data: Option<String>,
    },
}

/// Result from calling an external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpCallResult {
    /// Content returned by the tool.
    pub content: Vec<McpContent>,
    /// Whether the server reported the call as failed.
    #[serde(default)]
    pub is_error: bool,
}

impl McpCallResult {
    /// A successful result with text content.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text {
                text: content.into(),
            }],
            is_error: false,
        }
    }

    /// A failed result carrying an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    /// Text content joined by newlines.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                McpContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Connection to external tool servers.
#[async_trait::async_trait]
pub trait McpToolClient: Send + Sync {
    /// Call `tool` on `server`.
    ///
    /// Dropping the returned future abandons the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or the call fails in transport.
    async fn call_tool(&self, server: &str, tool: &str, args: Value) -> ToolResult<McpCallResult>;
}

/// One external tool bound to the client that serves it.
pub struct McpTool {
    definition: McpToolDefinition,
    full_name: String,
    description: String,
    client: Arc<dyn McpToolClient>,
}

impl McpTool {
    /// Bind a definition to a client.
    #[must_use]
    pub fn new(definition: McpToolDefinition, client: Arc<dyn McpToolClient>) -> Self {
        let full_name = definition.full_name();
        let description = definition
            .description
            .clone()
            .unwrap_or_else(|| format!("Tool {} from server {}", definition.name, definition.server));
        Self {
            definition,
            full_name,
            description,
            client,
        }
    }

    /// The wrapped definition.
    #[must_use]
    pub fn definition(&self) -> &McpToolDefinition {
        &self.definition
    }
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool")
            .field("name", &self.full_name)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.definition.input_schema.clone()
    }

    fn kind(&self) -> ToolKind {
        ToolKind::External
    }

    fn is_read_only(&self) -> bool {
        self.definition.read_only_hint
    }

    fn is_concurrency_safe(&self) -> bool {
        self.definition.read_only_hint
    }

    async fn validate_input(&self, input: &Value, _ctx: &ToolContext) -> ToolResult<()> {
        let Some(args) = input.as_object() else {
            return Err(ToolError::InvalidArguments("arguments must be an object".into()));
        };
        let missing: Vec<&str> = self
            .definition
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|key| !args.contains_key(*key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments(format!(
                "missing required arguments: {}",
                missing.join(", ")
            )))
        }
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        let client = Arc::clone(&self.client);
        let server = self.definition.server.clone();
        let tool = self.definition.name.clone();
        once_result(async move {
            debug!(server = %server, tool = %tool, request_id = %ctx.request_id, "calling external tool");
            let result = tokio::select! {
                () = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
                result = client.call_tool(&server, &tool, input) => result?,
            };

            let text = result.text_content();
            if result.is_error {
                let message = if text.is_empty() { "Unknown error".to_string() } else { text };
                return Err(ToolError::External(message));
            }
            Ok(ToolOutput::new(
                serde_json::to_value(&result.content).unwrap_or(Value::Null),
                truncate_output(text, ctx.env.max_output_chars),
            ))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        format!("{}({input})", self.full_name)
    }
}
