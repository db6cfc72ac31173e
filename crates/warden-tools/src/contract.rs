//! The capability contract every tool implements.

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::future::Future;
use warden_core::{ToolDescriptor, ToolKind};

use crate::context::{CallContext, ToolContext};
use crate::error::{ToolError, ToolResult};

/// Final payload of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Machine-readable result.
    pub data: Value,
    /// Natural-language rendering for the model.
    pub for_assistant: String,
}

impl ToolOutput {
    /// Create an output.
    #[must_use]
    pub fn new(data: Value, for_assistant: impl Into<String>) -> Self {
        Self {
            data,
            for_assistant: for_assistant.into(),
        }
    }

    /// Output whose payload is just the rendered text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            data: Value::String(text.clone()),
            for_assistant: text,
        }
    }
}

/// One item of a tool's output sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    /// Partial output (e.g. a line of shell output).
    Progress(String),
    /// Final result. Nothing follows it.
    Result(ToolOutput),
}

/// Lazy, finite, non-restartable sequence of tool events.
pub type ToolStream = BoxStream<'static, ToolResult<ToolEvent>>;

/// A capability the agent can invoke.
///
/// Tools are registered once at startup and dispatched by name. The
/// dispatcher asks, in order: does the active mode (or the user) allow it,
/// is the input valid, and can it share the turn with other tools. Only
/// then is [`Tool::call`] consumed.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Registry name. Built-ins never contain `:`; external tools are `server:tool`.
    fn name(&self) -> &str;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// JSON schema for tool input parameters.
    fn input_schema(&self) -> Value;

    /// Capability class.
    fn kind(&self) -> ToolKind;

    /// Whether the tool never mutates state.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Whether the tool may run alongside other concurrency-safe invocations.
    ///
    /// Undeclared tools are serialized. Read-only tools are safe regardless.
    fn is_concurrency_safe(&self) -> bool {
        false
    }

    /// Whether this particular invocation needs user confirmation when the
    /// active mode does not pre-authorize the tool.
    fn needs_permissions(&self, _input: &Value) -> bool {
        !self.is_read_only()
    }

    /// Check the input without side effects.
    ///
    /// # Errors
    ///
    /// Returns the reason the input is unacceptable.
    async fn validate_input(&self, input: &Value, ctx: &ToolContext) -> ToolResult<()>;

    /// Start the operation. Nothing runs until the stream is polled.
    fn call(&self, input: Value, ctx: CallContext) -> ToolStream;

    /// One-line human-facing description of an invocation.
    fn render_tool_use_message(&self, input: &Value) -> String;

    /// Human-facing rendering of a result.
    fn render_result(&self, output: &ToolOutput) -> String {
        output.for_assistant.clone()
    }

    /// Static facts the permission engine decides on.
    fn descriptor(&self) -> ToolDescriptor {
        let descriptor = ToolDescriptor::new(self.name(), self.kind());
        if self.is_read_only() {
            descriptor.read_only()
        } else if self.is_concurrency_safe() {
            descriptor.concurrency_safe()
        } else {
            descriptor
        }
    }
}

/// A stream that runs `fut` when first polled and yields its single result.
pub fn once_result<F>(fut: F) -> ToolStream
where
    F: Future<Output = ToolResult<ToolOutput>> + Send + 'static,
{
    stream::once(async move { fut.await.map(ToolEvent::Result) }).boxed()
}

/// Extract a required string argument.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when missing or not a string.
pub fn required_str<'a>(input: &'a Value, key: &str) -> ToolResult<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{key} is required")))
}

/// Extract an optional string argument.
#[must_use]
pub fn optional_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}

/// Extract an optional non-negative integer argument.
#[must_use]
pub fn optional_usize(input: &Value, key: &str) -> Option<usize> {
    input
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
}
