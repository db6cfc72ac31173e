//! Warden Core - Shared types for the agent control plane.
//!
//! This crate provides:
//! - The rejection taxonomy every layer reports through ([`ErrorKind`], [`Rejection`])
//! - Tool descriptors consumed by the permission engine ([`ToolDescriptor`], [`ToolKind`])
//! - Request-scoped cancellation ([`RequestContext`], [`AbortBarrier`], [`RequestTracker`])
//!
//! # Example
//!
//! ```
//! use warden_core::{RequestContext, RequestKind};
//!
//! let first = RequestContext::new(RequestKind::ToolInvocation);
//! let second = RequestContext::new(RequestKind::ToolInvocation);
//!
//! let first_barrier = first.create_barrier();
//! let second_barrier = second.create_barrier();
//!
//! first.cancel();
//! assert!(first_barrier.check_abort());
//! assert!(!second_barrier.check_abort());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod abort;
pub mod error;
pub mod tool;
pub mod tracker;

pub use abort::{AbortBarrier, RequestContext, RequestId, RequestKind};
pub use error::{ErrorKind, Rejection};
pub use tool::{ToolDescriptor, ToolKind};
pub use tracker::RequestTracker;
