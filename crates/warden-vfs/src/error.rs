use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use warden_core::{ErrorKind, Rejection};

/// Stable classification of a file service rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxCode {
    /// Path exceeds the configured length ceiling.
    TooLong,
    /// Path uses a home-directory shortcut or escapes its base.
    Traversal,
    /// Path contains shell metacharacters or NUL.
    SuspiciousPattern,
    /// Normalized path is not under any allowed base directory.
    OutsideAllowedDirectories,
    /// File name is empty, reserved or malformed.
    InvalidFileName,
    /// Target does not exist.
    DoesNotExist,
    /// Target is not a regular file.
    NotAFile,
    /// Extension is not on the allow-list.
    ExtensionNotAllowed,
    /// Content exceeds the size cap.
    TooLarge,
    /// A non-directory already occupies the path.
    PathExistsNotDirectory,
    /// Unexpected I/O failure.
    IoError,
}

impl SandboxCode {
    /// Stable wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooLong => "too_long",
            Self::Traversal => "traversal",
            Self::SuspiciousPattern => "suspicious_pattern",
            Self::OutsideAllowedDirectories => "outside_allowed_directories",
            Self::InvalidFileName => "invalid_file_name",
            Self::DoesNotExist => "does_not_exist",
            Self::NotAFile => "not_a_file",
            Self::ExtensionNotAllowed => "extension_not_allowed",
            Self::TooLarge => "too_large",
            Self::PathExistsNotDirectory => "path_exists_not_directory",
            Self::IoError => "io_error",
        }
    }

    /// Taxonomy kind this code reports under.
    #[must_use]
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::DoesNotExist => ErrorKind::NotFound,
            Self::NotAFile => ErrorKind::NotAFile,
            Self::PathExistsNotDirectory => ErrorKind::AlreadyExists,
            Self::IoError => ErrorKind::InternalError,
            Self::TooLong
            | Self::Traversal
            | Self::SuspiciousPattern
            | Self::OutsideAllowedDirectories
            | Self::InvalidFileName
            | Self::ExtensionNotAllowed
            | Self::TooLarge => ErrorKind::SandboxViolation,
        }
    }
}

impl fmt::Display for SandboxCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File service errors.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The request was rejected by a sandbox rule or a filesystem state check.
    #[error("{message}")]
    Rejected {
        /// Classification.
        code: SandboxCode,
        /// Human-readable cause.
        message: String,
    },

    /// Native IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    pub(crate) fn rejected(code: SandboxCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Classification of this error.
    #[must_use]
    pub fn code(&self) -> SandboxCode {
        match self {
            Self::Rejected { code, .. } => *code,
            Self::Io(_) => SandboxCode::IoError,
        }
    }

    /// Taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    /// Convert into a caller-facing rejection.
    ///
    /// I/O failures collapse to a generic internal error.
    #[must_use]
    pub fn to_rejection(&self) -> Rejection {
        match self {
            Self::Rejected { code, message } => {
                Rejection::new(code.kind(), message.clone()).with_cause(code.as_str())
            },
            Self::Io(e) => {
                tracing::error!(error = %e, "file service I/O failure");
                Rejection::internal().with_cause(SandboxCode::IoError.as_str())
            },
        }
    }
}

/// Convenience result type for file service operations.
pub type VfsResult<T> = Result<T, VfsError>;
