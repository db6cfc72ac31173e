//! Runtime error types.
//!
//! Only session setup can fail with an error. Tool invocations never
//! return one: every failure becomes a [`warden_core::Rejection`] inside a
//! [`crate::DispatchOutcome`].

use thiserror::Error;

/// Errors that can occur while bootstrapping a session.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The configuration names no workspace root.
    #[error("No workspace root configured")]
    NoWorkspaceRoot,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] warden_config::ConfigError),

    /// Permission configuration error.
    #[error("Approval error: {0}")]
    ApprovalError(#[from] warden_approval::ApprovalError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
