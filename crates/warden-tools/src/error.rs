use std::path::PathBuf;
use warden_core::{ErrorKind, Rejection};
use warden_vfs::VfsError;
use warden_workspace::Access;

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Input did not match the tool's expectations.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// A path falls outside the session's granted directories.
    #[error("Path is outside allowed {access} directories: {}", path.display())]
    OutsideBoundary {
        /// Which allow-list was consulted.
        access: Access,
        /// The requested path.
        path: PathBuf,
    },

    /// Rejected or failed inside the file service.
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// Path not found.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// The operation ran past its deadline.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// The request was cancelled.
    #[error("Request was cancelled")]
    Cancelled,

    /// An external tool server reported a failure.
    #[error("External tool failed: {0}")]
    External(String),

    /// Execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArguments(_) => ErrorKind::ValidationError,
            Self::OutsideBoundary { .. } => ErrorKind::SandboxViolation,
            Self::Vfs(e) => e.kind(),
            Self::PathNotFound(_) => ErrorKind::NotFound,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) | Self::External(_) | Self::ExecutionFailed(_) | Self::Io(_) => {
                ErrorKind::InternalError
            },
        }
    }

    /// Convert into a structured rejection for the caller and the model.
    ///
    /// Internal failures are logged in full and reported generically.
    #[must_use]
    pub fn to_rejection(&self) -> Rejection {
        match self {
            Self::Vfs(e) => e.to_rejection(),
            Self::Cancelled => Rejection::cancelled(),
            Self::OutsideBoundary { .. } => {
                Rejection::new(self.kind(), self.to_string()).with_cause("outside_allowed_directories")
            },
            Self::Timeout(_) => Rejection::new(self.kind(), self.to_string()).with_cause("timeout"),
            Self::External(_) | Self::ExecutionFailed(_) | Self::Io(_) => {
                tracing::error!(error = %self, "tool execution failed");
                Rejection::internal()
            },
            Self::InvalidArguments(_) | Self::PathNotFound(_) => {
                Rejection::new(self.kind(), self.to_string())
            },
        }
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_generic() {
        let err = ToolError::Io(std::io::Error::other("/home/me/.ssh/id_rsa unreadable"));
        let rejection = err.to_rejection();
        assert_eq!(rejection.kind, ErrorKind::InternalError);
        assert!(!rejection.render().contains(".ssh"));
    }

    #[test]
    fn test_boundary_rejection() {
        let err = ToolError::OutsideBoundary {
            access: Access::Write,
            path: PathBuf::from("/etc/passwd"),
        };
        let rejection = err.to_rejection();
        assert_eq!(rejection.kind, ErrorKind::SandboxViolation);
        assert_eq!(rejection.cause.as_deref(), Some("outside_allowed_directories"));
        assert!(rejection.message.contains("/etc/passwd"));
    }

    #[test]
    fn test_cancelled_is_not_failure() {
        let rejection = ToolError::Cancelled.to_rejection();
        assert!(rejection.kind.is_cancellation());
    }
}
