//! Warden Test - Shared test utilities for the Warden crates.
//!
//! Add as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! warden-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use warden_test::{CountingTool, TestWorkspace};
//!
//! let ws = TestWorkspace::new();
//! let tool = CountingTool::mutating("touch");
//! // register `tool.clone()` and dispatch against `ws.context()`
//! assert_eq!(tool.calls(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
