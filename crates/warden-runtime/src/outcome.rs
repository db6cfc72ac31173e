//! Events and results produced by a dispatch.

use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;
use warden_core::{ErrorKind, Rejection, RequestId};

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchResult {
    /// The tool ran to completion.
    Success {
        /// Machine-readable payload.
        data: Value,
        /// Text handed back to the model.
        for_assistant: String,
    },
    /// The invocation was refused, failed, or was cancelled.
    Rejected(Rejection),
}

/// The terminal result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    /// Request the invocation ran under.
    pub request_id: RequestId,
    /// Registry name of the invoked tool.
    pub tool: String,
    /// Human-facing description of the call.
    pub tool_use_message: String,
    /// Success payload or rejection.
    pub result: DispatchResult,
    /// Human-facing rendering of the result.
    pub rendered: String,
}

impl DispatchOutcome {
    pub(crate) fn rejected(
        request_id: RequestId,
        tool: impl Into<String>,
        tool_use_message: impl Into<String>,
        rejection: Rejection,
    ) -> Self {
        Self {
            request_id,
            tool: tool.into(),
            tool_use_message: tool_use_message.into(),
            rendered: rejection.render(),
            result: DispatchResult::Rejected(rejection),
        }
    }

    /// Whether the tool ran to completion.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.result, DispatchResult::Success { .. })
    }

    /// The rejection, if the invocation did not succeed.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.result {
            DispatchResult::Rejected(rejection) => Some(rejection),
            DispatchResult::Success { .. } => None,
        }
    }

    /// Taxonomy kind of the rejection, if any.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        self.rejection().map(|r| r.kind)
    }

    /// Whether the invocation ended because its request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == Some(ErrorKind::Cancelled)
    }

    /// Text for the model: the tool's output, or the rendered rejection.
    #[must_use]
    pub fn for_assistant(&self) -> &str {
        match &self.result {
            DispatchResult::Success { for_assistant, .. } => for_assistant,
            DispatchResult::Rejected(_) => &self.rendered,
        }
    }
}

/// One event of a dispatch stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// Partial output from a running tool.
    Progress {
        /// Registry name of the tool.
        tool: String,
        /// The progress line.
        message: String,
    },
    /// The last event of every dispatch stream.
    Finished(DispatchOutcome),
}

/// Lazy, finite sequence of dispatch events ending in [`DispatchEvent::Finished`].
pub type DispatchStream = BoxStream<'static, DispatchEvent>;
