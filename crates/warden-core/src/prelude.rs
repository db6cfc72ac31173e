//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_core::prelude::*;` to import all essential types.

// Rejections
pub use crate::{ErrorKind, Rejection};

// Tool classification
pub use crate::{ToolDescriptor, ToolKind};

// Cancellation
pub use crate::{AbortBarrier, RequestContext, RequestId, RequestKind, RequestTracker};
