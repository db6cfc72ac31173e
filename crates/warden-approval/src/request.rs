//! Approval request and decision types.

use serde::{Deserialize, Serialize};
use std::fmt;
use warden_core::RequestId;

use crate::mode::PermissionMode;

/// A prompt shown to the user before a tool runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request the invocation belongs to.
    pub request_id: RequestId,
    /// Registry name of the tool.
    pub tool: String,
    /// Human-readable summary of the invocation.
    pub summary: String,
    /// Raw tool input.
    pub input: serde_json::Value,
    /// Mode active when the prompt was raised.
    pub mode: PermissionMode,
}

impl ApprovalRequest {
    /// Create a request for `tool`.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        tool: impl Into<String>,
        summary: impl Into<String>,
        input: serde_json::Value,
        mode: PermissionMode,
    ) -> Self {
        Self {
            request_id,
            tool: tool.into(),
            summary: summary.into(),
            input,
            mode,
        }
    }
}

impl fmt::Display for ApprovalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.mode, self.tool, self.summary)
    }
}

/// The user's answer to an [`ApprovalRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Run this invocation only.
    ApproveOnce,
    /// Run this invocation and every later invocation of the same tool this session.
    ApproveSession,
    /// Do not run.
    Deny {
        /// Why the user declined.
        reason: String,
    },
}

impl ApprovalDecision {
    /// Whether the invocation may proceed.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        !matches!(self, Self::Deny { .. })
    }
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApproveOnce => write!(f, "approve once"),
            Self::ApproveSession => write!(f, "approve for session"),
            Self::Deny { reason } => write!(f, "deny: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_approval() {
        assert!(ApprovalDecision::ApproveOnce.is_approved());
        assert!(ApprovalDecision::ApproveSession.is_approved());
        assert!(
            !ApprovalDecision::Deny {
                reason: "no".into()
            }
            .is_approved()
        );
    }

    #[test]
    fn test_request_display() {
        let request = ApprovalRequest::new(
            RequestId::new(),
            "bash",
            "rm -rf build",
            serde_json::json!({"command": "rm -rf build"}),
            PermissionMode::Default,
        );
        assert_eq!(request.to_string(), "[default] bash: rm -rf build");
    }
}
