//! Rejection taxonomy shared by every layer of the control plane.
//!
//! A single bad tool call must never terminate a session, so failures are
//! carried as data: an [`ErrorKind`] the caller can branch on, an optional
//! stable cause code (e.g. `too_large`), and a short human-readable message
//! suitable for both the user and the model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of why an invocation did not produce a normal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input did not have the expected shape.
    ValidationError,
    /// The permission mode or the user rejected the action.
    PermissionDenied,
    /// Path, filename, extension or size rejected by the sandbox.
    SandboxViolation,
    /// The request was aborted mid-flight.
    Cancelled,
    /// The target does not exist.
    NotFound,
    /// The target exists but is not a regular file.
    NotAFile,
    /// The target exists and conflicts with the requested operation.
    AlreadyExists,
    /// An underlying operation failed unexpectedly.
    InternalError,
}

impl ErrorKind {
    /// Stable wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::PermissionDenied => "permission_denied",
            Self::SandboxViolation => "sandbox_violation",
            Self::Cancelled => "cancelled",
            Self::NotFound => "not_found",
            Self::NotAFile => "not_a_file",
            Self::AlreadyExists => "already_exists",
            Self::InternalError => "internal_error",
        }
    }

    /// Whether this kind is a terminal state rather than a failure.
    ///
    /// Cancellation is rendered as "cancelled", never as "failed".
    #[must_use]
    pub fn is_cancellation(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured rejection returned to the caller instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Rejection {
    /// Taxonomy kind.
    pub kind: ErrorKind,
    /// Stable cause code within the kind (e.g. `too_large`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Short human-readable explanation.
    pub message: String,
}

impl Rejection {
    /// Create a rejection without a cause code.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            cause: None,
            message: message.into(),
        }
    }

    /// Attach a stable cause code.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// A `validation_error` rejection.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    /// A `permission_denied` rejection.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// A `cancelled` rejection.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request was cancelled")
    }

    /// An `internal_error` rejection with a generic message.
    ///
    /// The underlying error is never included: internal paths and stack
    /// details must not flow back into the model conversation.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(ErrorKind::InternalError, "Tool execution failed")
    }

    /// Render the rejection for display (e.g. `sandbox_violation (too_large): ...`).
    #[must_use]
    pub fn render(&self) -> String {
        match &self.cause {
            Some(cause) => format!("{} ({cause}): {}", self.kind, self.message),
            None => format!("{}: {}", self.kind, self.message),
        }
    }
}
