//! Warden Workspace - Directory boundaries for agent file access.
//!
//! This crate answers one question for every path a tool wants to touch:
//! is it inside a directory the session has granted for reading (or writing)?
//!
//! # Key Concepts
//!
//! - **Grant**: An absolute directory added to the read or write allow-list
//! - **Containment**: Equal-to or descendant-of a grant, computed per path
//!   component (so `/home/app` is not under `/home/app-old`)
//! - **Minimal set**: Granting a parent prunes any granted descendants
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_workspace::PathBoundary;
//!
//! let boundary = PathBoundary::new("/home/user/project");
//! boundary.grant_read("/home/user/project");
//!
//! assert!(boundary.is_read_allowed("src/main.rs"));
//! assert!(!boundary.is_write_allowed("src/main.rs"));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod boundaries;
pub mod normalize;

pub use boundaries::{Access, PathBoundary};
pub use normalize::{
    fold_case, is_within, normalize_lexical, normalize_path, resolve_existing, resolve_path,
};
