/// Errors raised by the permission layer.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A mode name did not match any known permission mode.
    #[error("unknown permission mode: {0}")]
    UnknownMode(String),

    /// An approval was requested while no approval handler is registered.
    #[error("no approval handler registered")]
    NoHandler,
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
