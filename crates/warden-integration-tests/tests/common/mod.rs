//! Shared harness for integration tests.

use std::sync::Arc;

use warden_approval::PermissionMode;
use warden_config::Config;
use warden_runtime::{DispatchOutcome, Session};
use warden_test::{ScriptedApprovalHandler, TestWorkspace};
use warden_tools::ToolRegistry;

/// A session bootstrapped over a temporary workspace.
///
/// The workspace directory is removed when the harness is dropped.
#[allow(dead_code)]
pub struct SessionHarness {
    /// The session under test.
    pub session: Session,
    /// The approval handler registered with the session.
    pub approvals: ScriptedApprovalHandler,
    /// The backing workspace.
    pub workspace: TestWorkspace,
}

#[allow(dead_code)]
impl SessionHarness {
    /// Built-in tools, starting in `mode`, approving every prompt.
    pub async fn new(mode: PermissionMode) -> Self {
        Self::build(mode, |_| {}, ToolRegistry::with_defaults(), ScriptedApprovalHandler::approving()).await
    }

    /// Built-in tools with a config tweak applied before bootstrap.
    pub async fn with_config(mode: PermissionMode, tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(mode, tweak, ToolRegistry::with_defaults(), ScriptedApprovalHandler::approving()).await
    }

    /// Custom registry and approval handler.
    pub async fn with_tools(
        mode: PermissionMode,
        registry: ToolRegistry,
        approvals: ScriptedApprovalHandler,
    ) -> Self {
        Self::build(mode, |_| {}, registry, approvals).await
    }

    async fn build(
        mode: PermissionMode,
        tweak: impl FnOnce(&mut Config),
        registry: ToolRegistry,
        approvals: ScriptedApprovalHandler,
    ) -> Self {
        let workspace = TestWorkspace::new();
        let mut config = workspace.config();
        config.permissions.default_mode = mode.as_str().to_string();
        tweak(&mut config);

        let session = Session::bootstrap_with_tools(&config, registry).expect("bootstrap failed");
        session
            .register_approval_handler(Arc::new(approvals.clone()))
            .await;
        Self {
            session,
            approvals,
            workspace,
        }
    }

    /// Run one invocation as its own turn.
    pub async fn invoke(&self, tool: &str, input: serde_json::Value) -> DispatchOutcome {
        let turn = self.session.begin_turn();
        let mut outcomes = self
            .session
            .run_turn(&turn, vec![warden_runtime::Invocation::new(tool, input)])
            .await;
        self.session.end_turn(&turn);
        outcomes.pop().expect("one outcome per invocation")
    }
}
