//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_approval::prelude::*;` to import all essential types.

// Modes
pub use crate::{ModeConfig, ModeSnapshot, ModeVerdict, PermissionMode, PermissionModeEngine};

// Approval flow
pub use crate::{
    ApprovalDecision, ApprovalHandler, ApprovalManager, ApprovalOutcome, ApprovalProof,
    ApprovalRequest,
};

// Errors
pub use crate::{ApprovalError, ApprovalResult};
