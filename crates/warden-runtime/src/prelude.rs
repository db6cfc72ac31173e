//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_runtime::prelude::*;` to import all essential types.

// Dispatch
pub use crate::{DispatchEvent, DispatchOutcome, DispatchResult, DispatchStream, Invocation, ToolDispatcher};

// Session
pub use crate::Session;

// Errors
pub use crate::{RuntimeError, RuntimeResult};
