//! Prelude module - commonly used test helpers.
//!
//! Use `use warden_test::prelude::*;` in test modules.

pub use crate::{CountingTool, ScriptedApprovalHandler, SlowStreamingTool};
pub use crate::{TestWorkspace, setup_test_logging};
