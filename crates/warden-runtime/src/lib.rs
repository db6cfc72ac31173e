//! Warden Runtime - Tool dispatch, turn scheduling and session bootstrap.
//!
//! [`ToolDispatcher::invoke`] is the single entry point for running a
//! tool: it consults the permission mode, prompts for approval when
//! required, validates input, schedules the invocation on the shared or the
//! exclusive lane, and drains the tool's event stream under the request's
//! abort barrier. Every failure comes back as a structured
//! [`warden_core::Rejection`]; no invocation can take the session down.
//!
//! [`Session`] builds the boundary, file service, mode engine, approvals
//! and dispatcher from a [`warden_config::Config`], once.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod config_bridge;

mod dispatcher;
mod error;
mod outcome;
mod session;

pub use dispatcher::{Invocation, ToolDispatcher};
pub use error::{RuntimeError, RuntimeResult};
pub use outcome::{DispatchEvent, DispatchOutcome, DispatchResult, DispatchStream};
pub use session::Session;
