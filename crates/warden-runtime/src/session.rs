//! A session: the services one agent conversation runs against.

use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::info;
use warden_approval::{ApprovalHandler, ApprovalManager, PermissionMode, PermissionModeEngine};
use warden_config::Config;
use warden_core::{RequestContext, RequestId, RequestKind, RequestTracker};
use warden_tools::{ToolContext, ToolRegistry};
use warden_vfs::SecureFileService;
use warden_workspace::PathBoundary;

use crate::config_bridge::{to_path_boundary, to_permission_mode, to_sandbox_policy, to_shell_timeout};
use crate::dispatcher::{Invocation, ToolDispatcher};
use crate::error::{RuntimeError, RuntimeResult};
use crate::outcome::{DispatchEvent, DispatchOutcome, DispatchStream};

/// Services built once from configuration and shared by every invocation.
#[derive(Debug)]
pub struct Session {
    boundary: Arc<PathBoundary>,
    files: Arc<SecureFileService>,
    modes: Arc<PermissionModeEngine>,
    dispatcher: ToolDispatcher,
    tracker: RequestTracker,
}

impl Session {
    /// Build a session with the built-in tools.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has no workspace root or names
    /// an unknown permission mode.
    pub fn bootstrap(config: &Config) -> RuntimeResult<Self> {
        Self::bootstrap_with_tools(config, ToolRegistry::with_defaults())
    }

    /// Build a session over a caller-assembled registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has no workspace root or names
    /// an unknown permission mode.
    pub fn bootstrap_with_tools(config: &Config, registry: ToolRegistry) -> RuntimeResult<Self> {
        let root = config
            .workspace
            .root
            .clone()
            .ok_or(RuntimeError::NoWorkspaceRoot)?;
        let mode = to_permission_mode(config)?;

        let boundary = Arc::new(to_path_boundary(config, &root));
        let files = Arc::new(SecureFileService::with_cwd(
            root.clone(),
            to_sandbox_policy(config, &root),
        ));
        let modes = Arc::new(PermissionModeEngine::new(mode));
        let approvals = Arc::new(
            ApprovalManager::new().with_session_tools(config.permissions.session_allowed_tools.iter().cloned()),
        );

        let mut env = ToolContext::new(
            root.clone(),
            Arc::clone(&boundary),
            Arc::clone(&files),
            Arc::clone(&modes),
        )
        .with_shell_timeout(to_shell_timeout(config))
        .with_max_output_chars(config.tools.max_output_chars);
        if let Some(dir) = &config.tools.memory_dir {
            env = env.with_memory_dir(dir);
        }

        info!(
            root = %root.display(),
            %mode,
            tools = registry.len(),
            "session bootstrapped"
        );
        Ok(Self {
            boundary,
            files,
            modes,
            dispatcher: ToolDispatcher::new(Arc::new(registry), Arc::new(env), approvals),
            tracker: RequestTracker::new(),
        })
    }

    /// The dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// The path boundary.
    #[must_use]
    pub fn boundary(&self) -> &Arc<PathBoundary> {
        &self.boundary
    }

    /// The file service.
    #[must_use]
    pub fn files(&self) -> &Arc<SecureFileService> {
        &self.files
    }

    /// The permission mode engine.
    #[must_use]
    pub fn modes(&self) -> &Arc<PermissionModeEngine> {
        &self.modes
    }

    /// The approval manager.
    #[must_use]
    pub fn approvals(&self) -> &Arc<ApprovalManager> {
        self.dispatcher.approvals()
    }

    /// The request tracker.
    #[must_use]
    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Register the UI's approval handler.
    pub async fn register_approval_handler(&self, handler: Arc<dyn ApprovalHandler>) {
        self.approvals().register_handler(handler).await;
    }

    /// The active permission mode.
    #[must_use]
    pub fn current_mode(&self) -> PermissionMode {
        self.modes.current_mode()
    }

    /// Advance to the next mode in cycle order.
    pub fn cycle_mode(&self) -> PermissionMode {
        self.modes.cycle_mode()
    }

    /// Switch to `mode`.
    pub fn force_mode(&self, mode: PermissionMode) -> PermissionMode {
        self.modes.force_mode(mode)
    }

    /// Start a tracked turn.
    #[must_use]
    pub fn begin_turn(&self) -> RequestContext {
        self.tracker.prune();
        self.tracker.create(RequestKind::Turn)
    }

    /// Finish a turn and stop tracking it.
    pub fn end_turn(&self, turn: &RequestContext) -> bool {
        self.tracker.complete(turn.id())
    }

    /// Cancel one tracked request.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.tracker.cancel(id)
    }

    /// Run the invocations of `turn`. See [`ToolDispatcher::run_turn`].
    pub async fn run_turn(&self, turn: &RequestContext, invocations: Vec<Invocation>) -> Vec<DispatchOutcome> {
        self.dispatcher.run_turn(invocations, turn).await
    }

    /// Invoke one tool under a fresh tracked request.
    ///
    /// The returned id cancels the invocation through [`Session::cancel`].
    /// Dropping the stream, polled or not, finishes the request so the
    /// tracker lets go of it on the next prune.
    #[must_use]
    pub fn invoke(&self, name: &str, input: Value) -> (RequestId, DispatchStream) {
        self.tracker.prune();
        let request = self.tracker.create(RequestKind::ToolInvocation);
        let events = self.dispatcher.invoke(name, input, &request);
        (request.id(), TrackedStream { events, request }.boxed())
    }
}

/// A dispatch stream that finishes its request when dropped.
struct TrackedStream {
    events: DispatchStream,
    request: RequestContext,
}

impl Stream for TrackedStream {
    type Item = DispatchEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if self.request.is_active() {
            self.request.cancel();
            self.request.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use warden_core::ErrorKind;
    use warden_test::{CountingTool, ScriptedApprovalHandler, SlowStreamingTool, TestWorkspace};

    #[test]
    fn test_bootstrap_requires_root() {
        let err = Session::bootstrap(&Config::default()).unwrap_err();
        assert!(matches!(err, RuntimeError::NoWorkspaceRoot));
    }

    #[test]
    fn test_bootstrap_rejects_unknown_mode() {
        let ws = TestWorkspace::new();
        let mut config = ws.config();
        config.permissions.default_mode = "yolo".into();
        let err = Session::bootstrap(&config).unwrap_err();
        assert!(matches!(err, RuntimeError::ApprovalError(_)));
    }

    #[test]
    fn test_bootstrap_wires_services() {
        let ws = TestWorkspace::new();
        let mut config = ws.config();
        config.permissions.default_mode = "acceptEdits".into();
        let session = Session::bootstrap(&config).unwrap();

        assert_eq!(session.current_mode(), PermissionMode::AcceptEdits);
        assert!(session.boundary().is_write_allowed(ws.path("src/main.rs")));
        assert!(!session.boundary().is_read_allowed("/etc/passwd"));
        assert!(session.dispatcher().registry().get("write_file").is_some());

        assert_eq!(session.cycle_mode(), PermissionMode::Plan);
        assert_eq!(session.force_mode(PermissionMode::Default), PermissionMode::Default);
    }

    #[tokio::test]
    async fn test_session_allowed_tools_skip_prompt() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("deploy");
        let mut registry = ToolRegistry::new();
        registry.register(tool.handle());
        let mut config = ws.config();
        config.permissions.session_allowed_tools.push("deploy".into());
        let session = Session::bootstrap_with_tools(&config, registry).unwrap();
        let handler = ScriptedApprovalHandler::denying("never asked");
        session.register_approval_handler(Arc::new(handler.clone())).await;

        let turn = session.begin_turn();
        let outcomes = session
            .run_turn(&turn, vec![Invocation::new("deploy", json!({}))])
            .await;
        assert!(outcomes[0].is_success());
        assert_eq!(handler.calls(), 0);
        assert!(session.end_turn(&turn));
    }

    #[tokio::test]
    async fn test_cancel_turn_by_id() {
        let ws = TestWorkspace::new();
        let session = Session::bootstrap(&ws.config()).unwrap();

        let turn = session.begin_turn();
        assert_eq!(session.tracker().len(), 1);
        assert!(session.cancel(turn.id()));
        let outcomes = session
            .run_turn(&turn, vec![Invocation::new("glob", json!({"pattern": "*"}))])
            .await;
        assert_eq!(outcomes[0].kind(), Some(ErrorKind::Cancelled));

        // Turns finished outside the session are pruned when the next one starts.
        assert!(turn.complete());
        let next = session.begin_turn();
        assert_eq!(session.tracker().len(), 1);
        assert!(session.tracker().get(next.id()).is_some());
    }

    #[tokio::test]
    async fn test_invoke_cancel_by_id() {
        let ws = TestWorkspace::new();
        let ticker = SlowStreamingTool::new("ticker", Duration::from_millis(10));
        let mut registry = ToolRegistry::new();
        registry.register(ticker.handle());
        let session = Session::bootstrap_with_tools(&ws.config(), registry).unwrap();

        let (id, mut events) = session.invoke("ticker", json!({}));
        assert!(matches!(events.next().await, Some(DispatchEvent::Progress { .. })));
        assert!(session.cancel(id));

        let rest: Vec<_> = tokio::time::timeout(Duration::from_secs(5), events.collect())
            .await
            .unwrap();
        assert!(matches!(
            rest.last(),
            Some(DispatchEvent::Finished(outcome)) if outcome.is_cancelled()
        ));
    }

    #[tokio::test]
    async fn test_dropped_invoke_stream_is_untracked() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("touch");
        let mut registry = ToolRegistry::new();
        registry.register(tool.handle());
        let session = Session::bootstrap_with_tools(&ws.config(), registry).unwrap();

        let (id, events) = session.invoke("touch", json!({}));
        assert!(session.tracker().get(id).is_some());
        drop(events);

        assert_eq!(session.tracker().prune(), 1);
        assert!(session.tracker().is_empty());
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_drained_invoke_is_pruned() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("touch");
        let mut registry = ToolRegistry::new();
        registry.register(tool.handle());
        let mut config = ws.config();
        config.permissions.default_mode = "bypassPermissions".into();
        let session = Session::bootstrap_with_tools(&config, registry).unwrap();

        let (_, events) = session.invoke("touch", json!({}));
        let all: Vec<_> = events.collect().await;
        assert!(matches!(all.last(), Some(DispatchEvent::Finished(outcome)) if outcome.is_success()));

        let _turn = session.begin_turn();
        assert_eq!(session.tracker().len(), 1);
        assert_eq!(tool.calls(), 1);
    }
}
