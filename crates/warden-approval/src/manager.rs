//! Approval manager: the prompt flow behind `RequiresApproval` verdicts.
//!
//! # Approval Flow
//!
//! 1. If the tool was approved for the session, allow without prompting
//! 2. Otherwise send an [`ApprovalRequest`] to the registered handler
//! 3. Wait for the decision (with configurable timeout)
//! 4. No handler, an unavailable handler, no answer or a timeout all deny
//! 5. `ApproveSession` remembers the tool for the rest of the session

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ApprovalError, ApprovalResult};
use crate::request::{ApprovalDecision, ApprovalRequest};

/// Default approval timeout (5 minutes).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Trait for UI implementations that present approval requests to users.
///
/// # Example
///
/// ```rust,ignore
/// use warden_approval::{ApprovalDecision, ApprovalHandler, ApprovalRequest};
///
/// struct TerminalPrompt;
///
/// #[async_trait::async_trait]
/// impl ApprovalHandler for TerminalPrompt {
///     async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision> {
///         // Render the request, read a key...
///         Some(ApprovalDecision::ApproveOnce)
///     }
///
///     fn is_available(&self) -> bool {
///         true
///     }
/// }
/// ```
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Present an approval request and wait for a decision.
    ///
    /// Returns `None` if the user did not respond.
    async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision>;

    /// Whether the handler can currently receive requests.
    fn is_available(&self) -> bool;
}

/// How an approved invocation was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalProof {
    /// An earlier `ApproveSession` (or a persisted approval) covers the tool.
    SessionAllowance,
    /// The user approved this invocation only.
    OneTimeApproval,
    /// The user approved this tool for the rest of the session.
    SessionApproval,
}

/// The outcome of an approval check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Proceed.
    Allowed {
        /// How the invocation was authorized.
        proof: ApprovalProof,
    },
    /// Do not proceed.
    Denied {
        /// Reason for denial.
        reason: String,
    },
}

impl ApprovalOutcome {
    /// Check if this outcome allows the invocation to proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Coordinates session approvals and the UI approval handler.
pub struct ApprovalManager {
    handler: RwLock<Option<Arc<dyn ApprovalHandler>>>,
    timeout: RwLock<Duration>,
    session_tools: StdRwLock<BTreeSet<String>>,
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalManager {
    /// Create a manager with no handler and no session approvals.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handler: RwLock::new(None),
            timeout: RwLock::new(DEFAULT_TIMEOUT),
            session_tools: StdRwLock::new(BTreeSet::new()),
        }
    }

    /// Seed session approvals (persisted approvals handed in by configuration).
    #[must_use]
    pub fn with_session_tools<I, S>(self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut set = self.session_tools_mut();
            set.extend(tools.into_iter().map(Into::into));
        }
        self
    }

    /// Register an approval handler (UI frontend).
    pub async fn register_handler(&self, handler: Arc<dyn ApprovalHandler>) {
        *self.handler.write().await = Some(handler);
    }

    /// Remove the registered handler. Later prompts deny.
    pub async fn clear_handler(&self) {
        *self.handler.write().await = None;
    }

    /// Set the approval timeout.
    pub async fn set_timeout(&self, timeout: Duration) {
        *self.timeout.write().await = timeout;
    }

    /// Whether `tool` has been approved for the session.
    #[must_use]
    pub fn is_session_approved(&self, tool: &str) -> bool {
        self.session_tools
            .read()
            .unwrap_or_else(|e| {
                warn!("ApprovalManager session lock poisoned, recovering");
                PoisonError::into_inner(e)
            })
            .contains(tool)
    }

    /// Tools approved for the session.
    #[must_use]
    pub fn session_tools(&self) -> Vec<String> {
        self.session_tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Forget every session approval.
    pub fn clear_session(&self) {
        self.session_tools_mut().clear();
    }

    /// Run the approval flow for one invocation.
    pub async fn check_approval(&self, request: ApprovalRequest) -> ApprovalOutcome {
        if self.is_session_approved(&request.tool) {
            debug!(tool = %request.tool, "covered by session approval");
            return ApprovalOutcome::Allowed {
                proof: ApprovalProof::SessionAllowance,
            };
        }

        let handler = match self.current_handler().await {
            Ok(handler) => handler,
            Err(e) => return deny(&request, e.to_string()),
        };
        if !handler.is_available() {
            return deny(&request, "approval handler unavailable");
        }

        let timeout = *self.timeout.read().await;
        let tool = request.tool.clone();
        match tokio::time::timeout(timeout, handler.request_approval(request.clone())).await {
            Err(_) => deny(&request, "approval request timed out"),
            Ok(None) => deny(&request, "user did not respond"),
            Ok(Some(decision)) => self.handle_decision(tool, decision),
        }
    }

    fn handle_decision(&self, tool: String, decision: ApprovalDecision) -> ApprovalOutcome {
        match decision {
            ApprovalDecision::ApproveOnce => ApprovalOutcome::Allowed {
                proof: ApprovalProof::OneTimeApproval,
            },
            ApprovalDecision::ApproveSession => {
                info!(tool = %tool, "tool approved for session");
                self.session_tools_mut().insert(tool);
                ApprovalOutcome::Allowed {
                    proof: ApprovalProof::SessionApproval,
                }
            },
            ApprovalDecision::Deny { reason } => {
                info!(tool = %tool, reason = %reason, "user denied tool");
                ApprovalOutcome::Denied { reason }
            },
        }
    }

    async fn current_handler(&self) -> ApprovalResult<Arc<dyn ApprovalHandler>> {
        self.handler
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(ApprovalError::NoHandler)
    }

    fn session_tools_mut(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<String>> {
        self.session_tools.write().unwrap_or_else(|e| {
            warn!("ApprovalManager session lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }
}

fn deny(request: &ApprovalRequest, reason: impl Into<String>) -> ApprovalOutcome {
    let reason = reason.into();
    warn!(tool = %request.tool, request_id = %request.request_id, reason = %reason, "approval failed closed");
    ApprovalOutcome::Denied { reason }
}

impl std::fmt::Debug for ApprovalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalManager")
            .field("session_tools", &self.session_tools())
            .finish_non_exhaustive()
    }
}
