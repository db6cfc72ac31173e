//! Warden Approval - Permission modes and human-in-the-loop approval.
//!
//! Two layers decide whether a tool invocation may run:
//!
//! - **Mode** ([`PermissionModeEngine`]): the session-wide policy. Each
//!   [`PermissionMode`] pre-authorizes, blocks, or defers a tool to the user
//!   based on its [`warden_core::ToolDescriptor`].
//! - **Approval** ([`ApprovalManager`]): when the mode defers, the registered
//!   [`ApprovalHandler`] is asked for approve-once, approve-for-session or
//!   deny. Anything short of an answer denies.
//!
//! # Example
//!
//! ```
//! use warden_approval::{ModeVerdict, PermissionMode, PermissionModeEngine};
//! use warden_core::{ToolDescriptor, ToolKind};
//!
//! let engine = PermissionModeEngine::default();
//! let edit = ToolDescriptor::new("edit_file", ToolKind::FileEdit);
//!
//! assert_eq!(engine.authorize(&edit), ModeVerdict::RequiresApproval);
//! assert_eq!(engine.cycle_mode(), PermissionMode::AcceptEdits);
//! assert_eq!(engine.authorize(&edit), ModeVerdict::PreAuthorized);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod engine;
/// Error types and results for the approval module.
pub mod error;
pub mod manager;
pub mod mode;
pub mod request;

pub use engine::{ModeSnapshot, PermissionModeEngine};
pub use error::{ApprovalError, ApprovalResult};
pub use manager::{ApprovalHandler, ApprovalManager, ApprovalOutcome, ApprovalProof};
pub use mode::{ModeConfig, ModeVerdict, PermissionMode};
pub use request::{ApprovalDecision, ApprovalRequest};
