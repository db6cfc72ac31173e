//! Warden VFS - Sandboxed file operations.
//!
//! [`SecureFileService`] is the last check before a tool touches disk. Every
//! path goes through the same gate:
//!
//! 1. Syntax: length ceiling, no `~` shortcuts, no shell metacharacters
//! 2. Containment: the normalized path must sit under an allowed base path
//! 3. Per operation: file name rules, extension allow-list, size caps
//!
//! Rejections carry a stable [`SandboxCode`] so callers can branch on cause.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_vfs::{SandboxPolicy, SecureFileService, WriteOptions};
//!
//! let files = SecureFileService::with_cwd("/project", SandboxPolicy::rooted("/project"));
//! files.write_file("out.txt", "hi", WriteOptions::default()).await?;
//! assert!(files.write_file("/etc/passwd", "x", WriteOptions::default()).await.is_err());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Error types for sandboxed file operations.
pub mod error;
pub mod policy;
pub mod service;
pub mod validate;

pub use error::{SandboxCode, VfsError, VfsResult};
pub use policy::SandboxPolicy;
pub use service::{
    FileContent, FileMetadata, ReadOptions, SecureFileService, StagedWrite, WriteOptions,
};
pub use validate::validate_file_name;
