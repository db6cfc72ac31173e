//! The single dispatch entry point for tool invocations.
//!
//! Every invocation walks the same gates in order: lookup, mode verdict,
//! approval prompt, input validation, request liveness, scheduling lane,
//! then the tool's event stream drained under the request's abort barrier.
//! Any gate can end the invocation with a [`Rejection`]; nothing escapes as
//! an error.

use futures::channel::mpsc::{self, UnboundedSender};
use futures::future;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info_span, warn};
use warden_approval::{ApprovalManager, ApprovalOutcome, ApprovalRequest, ModeVerdict};
use warden_core::{AbortBarrier, Rejection, RequestContext, RequestKind};
use warden_tools::{CallContext, Tool, ToolContext, ToolEvent, ToolRegistry};

use crate::outcome::{DispatchEvent, DispatchOutcome, DispatchResult, DispatchStream};

/// One requested tool call within a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Registry name of the tool.
    pub name: String,
    /// Raw input.
    pub input: Value,
}

impl Invocation {
    /// Create an invocation.
    #[must_use]
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }
}

/// Cleans the barrier up however the invocation ends.
///
/// An invocation dropped before it produced an outcome cancels its request
/// first, so work the tool spawned off the stream observes the abort.
struct BarrierGuard<'a> {
    request: &'a RequestContext,
    barrier: &'a AbortBarrier,
    finished: bool,
}

impl Drop for BarrierGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(request_id = %self.request.id(), "invocation abandoned");
            self.request.cancel();
        }
        self.barrier.cleanup();
    }
}

/// Authorizes, validates, schedules and runs tool invocations.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    env: Arc<ToolContext>,
    approvals: Arc<ApprovalManager>,
    exclusive: Arc<Mutex<()>>,
}

impl ToolDispatcher {
    /// Create a dispatcher over a registry and the session's tool environment.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        env: Arc<ToolContext>,
        approvals: Arc<ApprovalManager>,
    ) -> Self {
        Self {
            registry,
            env,
            approvals,
            exclusive: Arc::new(Mutex::new(())),
        }
    }

    /// The tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The shared tool environment.
    #[must_use]
    pub fn env(&self) -> &Arc<ToolContext> {
        &self.env
    }

    /// The approval manager.
    #[must_use]
    pub fn approvals(&self) -> &Arc<ApprovalManager> {
        &self.approvals
    }

    /// Whether `name` may run alongside other concurrency-safe invocations.
    ///
    /// Unknown tools count as safe: they are rejected before doing anything.
    #[must_use]
    pub fn is_concurrency_safe(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .is_none_or(|tool| tool.descriptor().concurrency_safe)
    }

    /// Invoke `name` with `input` under `request`.
    ///
    /// Nothing happens until the returned stream is polled. The stream
    /// yields progress events and always ends with exactly one
    /// [`DispatchEvent::Finished`]. The request is completed when the
    /// invocation ends; dropping the stream mid-flight cancels the request
    /// and then completes it.
    #[must_use]
    pub fn invoke(&self, name: &str, input: Value, request: &RequestContext) -> DispatchStream {
        let (tx, rx) = mpsc::unbounded();
        let this = self.clone();
        let name = name.to_string();
        let request = request.clone();
        let span = info_span!("invoke", request_id = %request.id(), tool = %name);

        let driver = async move {
            let outcome = this.drive(&name, input, &request, &tx).await;
            if tx.unbounded_send(DispatchEvent::Finished(outcome)).is_err() {
                debug!("dispatch stream dropped before completion");
            }
        }
        .instrument(span);

        // Progress and the final outcome share one channel so they arrive in order.
        let driver = stream::once(driver).filter_map(|()| future::ready(None::<DispatchEvent>));
        stream::select(rx, driver).boxed()
    }

    /// Invoke `name` and wait for its outcome, discarding progress.
    pub async fn execute(&self, name: &str, input: Value, request: &RequestContext) -> DispatchOutcome {
        let mut events = self.invoke(name, input, request);
        let mut outcome = None;
        while let Some(event) = events.next().await {
            if let DispatchEvent::Finished(finished) = event {
                outcome = Some(finished);
            }
        }
        outcome.unwrap_or_else(|| {
            error!(tool = %name, "dispatch ended without an outcome");
            DispatchOutcome::rejected(request.id(), name, String::new(), Rejection::internal())
        })
    }

    /// Run the invocations of one turn and return outcomes in invocation order.
    ///
    /// Consecutive concurrency-safe invocations run together; every other
    /// invocation runs alone, after everything before it has finished. Each
    /// invocation gets a child request of `turn`, so cancelling the turn
    /// cancels all of them while one invocation finishing never affects its
    /// siblings.
    pub async fn run_turn(&self, invocations: Vec<Invocation>, turn: &RequestContext) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(invocations.len());
        let mut batch = Vec::new();

        for invocation in invocations {
            if self.is_concurrency_safe(&invocation.name) {
                batch.push(invocation);
                continue;
            }
            outcomes.extend(self.run_concurrent(std::mem::take(&mut batch), turn).await);
            let child = turn.child(RequestKind::ToolInvocation);
            outcomes.push(self.execute(&invocation.name, invocation.input, &child).await);
        }
        outcomes.extend(self.run_concurrent(batch, turn).await);
        outcomes
    }

    async fn run_concurrent(&self, batch: Vec<Invocation>, turn: &RequestContext) -> Vec<DispatchOutcome> {
        if batch.is_empty() {
            return Vec::new();
        }
        debug!(request_id = %turn.id(), count = batch.len(), "running concurrent batch");
        future::join_all(batch.into_iter().map(|invocation| {
            let child = turn.child(RequestKind::ToolInvocation);
            async move { self.execute(&invocation.name, invocation.input, &child).await }
        }))
        .await
    }

    async fn drive(
        &self,
        name: &str,
        input: Value,
        request: &RequestContext,
        tx: &UnboundedSender<DispatchEvent>,
    ) -> DispatchOutcome {
        let barrier = request.create_barrier();
        let mut guard = BarrierGuard {
            request,
            barrier: &barrier,
            finished: false,
        };
        let outcome = self.settle(name, input, request, &barrier, tx).await;
        guard.finished = true;
        outcome
    }

    async fn settle(
        &self,
        name: &str,
        input: Value,
        request: &RequestContext,
        barrier: &AbortBarrier,
        tx: &UnboundedSender<DispatchEvent>,
    ) -> DispatchOutcome {
        let Some(tool) = self.registry.get(name) else {
            debug!("unknown tool");
            return DispatchOutcome::rejected(
                request.id(),
                name,
                String::new(),
                Rejection::validation(format!("Unknown tool: {name}")),
            );
        };

        let tool_use_message = tool.render_tool_use_message(&input);

        let result = self
            .run(tool.as_ref(), input, request, barrier, &tool_use_message, tx)
            .await;
        let rendered = match &result {
            Ok(output) => tool.render_result(output),
            Err(rejection) => rejection.render(),
        };
        let result = match result {
            Ok(output) => {
                debug!("tool completed");
                DispatchResult::Success {
                    data: output.data,
                    for_assistant: output.for_assistant,
                }
            },
            Err(rejection) => {
                debug!(kind = %rejection.kind, cause = ?rejection.cause, "tool rejected");
                DispatchResult::Rejected(rejection)
            },
        };
        DispatchOutcome {
            request_id: request.id(),
            tool: name.to_string(),
            tool_use_message,
            result,
            rendered,
        }
    }

    async fn run(
        &self,
        tool: &dyn Tool,
        input: Value,
        request: &RequestContext,
        barrier: &AbortBarrier,
        tool_use_message: &str,
        tx: &UnboundedSender<DispatchEvent>,
    ) -> Result<warden_tools::ToolOutput, Rejection> {
        let descriptor = tool.descriptor();
        let mode = self.env.modes.current_mode();

        match mode.authorize(&descriptor) {
            ModeVerdict::Blocked => {
                warn!(%mode, "tool blocked by permission mode");
                return Err(Rejection::permission_denied(format!(
                    "{} is not allowed in {mode} mode",
                    descriptor.name
                )));
            },
            ModeVerdict::RequiresApproval if tool.needs_permissions(&input) => {
                let prompt = ApprovalRequest::new(
                    request.id(),
                    &descriptor.name,
                    tool_use_message,
                    input.clone(),
                    mode,
                );
                let outcome = tokio::select! {
                    biased;
                    () = barrier.aborted() => return Err(Rejection::cancelled()),
                    outcome = self.approvals.check_approval(prompt) => outcome,
                };
                if let ApprovalOutcome::Denied { reason } = outcome {
                    return Err(Rejection::permission_denied(reason));
                }
            },
            ModeVerdict::RequiresApproval | ModeVerdict::PreAuthorized => {},
        }

        tool.validate_input(&input, &self.env)
            .await
            .map_err(|e| e.to_rejection())?;

        if !request.is_active() || barrier.check_abort() {
            return Err(Rejection::cancelled());
        }

        let _lane = if descriptor.concurrency_safe {
            None
        } else {
            tokio::select! {
                biased;
                () = barrier.aborted() => return Err(Rejection::cancelled()),
                guard = self.exclusive.lock() => Some(guard),
            }
        };

        let call = CallContext::new(Arc::clone(&self.env), request.id(), request.cancellation_token());
        let mut events = tool.call(input, call);
        loop {
            let next = tokio::select! {
                biased;
                () = barrier.aborted() => return Err(Rejection::cancelled()),
                next = events.next() => next,
            };
            match next {
                Some(Ok(ToolEvent::Progress(message))) => {
                    let event = DispatchEvent::Progress {
                        tool: descriptor.name.clone(),
                        message,
                    };
                    if tx.unbounded_send(event).is_err() {
                        return Err(Rejection::cancelled());
                    }
                },
                Some(Ok(ToolEvent::Result(output))) => return Ok(output),
                Some(Err(e)) => return Err(e.to_rejection()),
                None => {
                    error!("tool stream ended without a result");
                    return Err(Rejection::internal());
                },
            }
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("registry", &self.registry)
            .field("workspace_root", &self.env.workspace_root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use warden_approval::{ApprovalDecision, PermissionMode};
    use warden_core::{ErrorKind, ToolKind};
    use warden_test::{CountingTool, ScriptedApprovalHandler, SlowStreamingTool, TestWorkspace};
    use warden_tools::ExitPlanModeTool;

    fn dispatcher(ws: &TestWorkspace, tools: &[Arc<dyn Tool>]) -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(Arc::clone(tool));
        }
        ToolDispatcher::new(Arc::new(registry), ws.context(), Arc::new(ApprovalManager::new()))
    }

    async fn with_handler(d: &ToolDispatcher, handler: &ScriptedApprovalHandler) {
        d.approvals().register_handler(Arc::new(handler.clone())).await;
    }

    fn request() -> RequestContext {
        RequestContext::new(RequestKind::ToolInvocation)
    }

    #[tokio::test]
    async fn test_unknown_tool_is_validation_error() {
        let ws = TestWorkspace::new();
        let d = dispatcher(&ws, &[]);
        let req = request();
        let outcome = d.execute("nope", json!({}), &req).await;
        assert_eq!(outcome.kind(), Some(ErrorKind::ValidationError));
        assert!(outcome.rendered.contains("Unknown tool: nope"));
        assert!(!req.is_active());
    }

    #[tokio::test]
    async fn test_plan_mode_blocks_without_prompt() {
        let ws = TestWorkspace::with_mode(PermissionMode::Plan);
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);
        let handler = ScriptedApprovalHandler::approving();
        with_handler(&d, &handler).await;

        let outcome = d.execute("touch", json!({}), &request()).await;
        assert_eq!(outcome.kind(), Some(ErrorKind::PermissionDenied));
        assert!(outcome.rendered.contains("plan"));
        assert_eq!(tool.calls(), 0);
        assert_eq!(tool.validations(), 0);
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn test_plan_mode_runs_read_only() {
        let ws = TestWorkspace::with_mode(PermissionMode::Plan);
        let tool = CountingTool::read_only("lookup");
        let d = dispatcher(&ws, &[tool.handle()]);

        let outcome = d.execute("lookup", json!({}), &request()).await;
        assert!(outcome.is_success());
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test]
    async fn test_denied_prompt_short_circuits() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);
        let handler = ScriptedApprovalHandler::denying("not now");
        with_handler(&d, &handler).await;

        let outcome = d.execute("touch", json!({}), &request()).await;
        assert_eq!(outcome.kind(), Some(ErrorKind::PermissionDenied));
        assert!(outcome.rendered.contains("not now"));
        assert_eq!(handler.calls(), 1);
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_handler_fails_closed() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);

        let outcome = d.execute("touch", json!({}), &request()).await;
        assert_eq!(outcome.kind(), Some(ErrorKind::PermissionDenied));
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_approve_once_prompts_every_time() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);
        let handler = ScriptedApprovalHandler::approving();
        with_handler(&d, &handler).await;

        assert!(d.execute("touch", json!({}), &request()).await.is_success());
        assert!(d.execute("touch", json!({}), &request()).await.is_success());
        assert_eq!(handler.calls(), 2);
        assert_eq!(tool.calls(), 2);
        assert_eq!(handler.requests()[0].tool, "touch");
    }

    #[tokio::test]
    async fn test_approve_session_skips_later_prompts() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);
        let handler = ScriptedApprovalHandler::new([ApprovalDecision::ApproveSession]);
        with_handler(&d, &handler).await;

        assert!(d.execute("touch", json!({}), &request()).await.is_success());
        assert!(d.execute("touch", json!({}), &request()).await.is_success());
        assert_eq!(handler.calls(), 1);
        assert!(d.approvals().is_session_approved("touch"));
    }

    #[tokio::test]
    async fn test_accept_edits_prompts_only_for_shell() {
        let ws = TestWorkspace::with_mode(PermissionMode::AcceptEdits);
        let edit = CountingTool::mutating("patch").with_kind(ToolKind::FileEdit);
        let shell = CountingTool::mutating("run");
        let d = dispatcher(&ws, &[edit.handle(), shell.handle()]);

        assert!(d.execute("patch", json!({}), &request()).await.is_success());
        let outcome = d.execute("run", json!({}), &request()).await;
        assert_eq!(outcome.kind(), Some(ErrorKind::PermissionDenied));
        assert_eq!(edit.calls(), 1);
        assert_eq!(shell.calls(), 0);
    }

    #[tokio::test]
    async fn test_bypass_runs_without_prompt() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);

        assert!(d.execute("touch", json!({}), &request()).await.is_success());
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_never_runs() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);

        let outcome = d.execute("touch", json!({"invalid": true}), &request()).await;
        assert_eq!(outcome.kind(), Some(ErrorKind::ValidationError));
        assert_eq!(tool.validations(), 1);
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_never_runs() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::read_only("lookup");
        let d = dispatcher(&ws, &[tool.handle()]);
        let req = request();
        req.cancel();

        let outcome = d.execute("lookup", json!({}), &req).await;
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.rendered, "cancelled: Request was cancelled");
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_prompt() {
        let ws = TestWorkspace::new();
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);
        let handler = ScriptedApprovalHandler::approving().with_delay(Duration::from_secs(30));
        with_handler(&d, &handler).await;

        let req = request();
        let canceller = req.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let outcome = tokio::time::timeout(Duration::from_secs(5), d.execute("touch", json!({}), &req))
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_progress_streams_before_result() {
        let ws = TestWorkspace::new();
        let tool = SlowStreamingTool::new("ticker", Duration::from_millis(1)).finish_after(3);
        let d = dispatcher(&ws, &[tool.handle()]);

        let events: Vec<_> = d.invoke("ticker", json!({}), &request()).collect().await;
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            DispatchEvent::Progress {
                tool: "ticker".into(),
                message: "tick 1".into()
            }
        );
        let Some(DispatchEvent::Finished(outcome)) = events.last() else {
            panic!("expected outcome last");
        };
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_invoke_is_lazy() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);

        let events = d.invoke("touch", json!({}), &request());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tool.calls(), 0);
        drop(events);
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_stops_tool() {
        let ws = TestWorkspace::new();
        let tool = SlowStreamingTool::new("ticker", Duration::from_millis(10));
        let d = dispatcher(&ws, &[tool.handle()]);
        let req = request();

        let mut events = d.invoke("ticker", json!({}), &req);
        let first = events.next().await.unwrap();
        assert!(matches!(first, DispatchEvent::Progress { .. }));

        req.cancel();
        let rest: Vec<_> = tokio::time::timeout(Duration::from_secs(5), events.collect())
            .await
            .unwrap();
        let Some(DispatchEvent::Finished(outcome)) = rest.last() else {
            panic!("expected outcome last");
        };
        assert!(outcome.is_cancelled());
        assert!(tool.released());
        assert!(!req.is_active());
    }

    #[tokio::test]
    async fn test_dropped_stream_cancels_request() {
        let ws = TestWorkspace::new();
        let tool = SlowStreamingTool::new("ticker", Duration::from_millis(10));
        let d = dispatcher(&ws, &[tool.handle()]);
        let req = request();
        let token = req.cancellation_token();

        let mut events = d.invoke("ticker", json!({}), &req);
        let first = events.next().await.unwrap();
        assert!(matches!(first, DispatchEvent::Progress { .. }));

        drop(events);
        assert!(token.is_cancelled());
        assert!(!req.is_active());
        assert!(tool.released());
    }

    #[tokio::test]
    async fn test_finished_invocation_leaves_request_uncancelled() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let tool = CountingTool::mutating("touch");
        let d = dispatcher(&ws, &[tool.handle()]);
        let req = request();

        let outcome = d.execute("touch", json!({}), &req).await;
        assert!(outcome.is_success());
        assert!(!req.is_cancelled());
        assert!(!req.is_active());
    }

    #[tokio::test]
    async fn test_exit_plan_mode_through_dispatch() {
        let ws = TestWorkspace::with_mode(PermissionMode::Plan);
        let exit: Arc<dyn Tool> = Arc::new(ExitPlanModeTool);
        let d = dispatcher(&ws, &[exit]);

        let outcome = d
            .execute("exit_plan_mode", json!({"plan": "1. edit lib.rs"}), &request())
            .await;
        assert!(outcome.is_success());
        assert_eq!(ws.modes().current_mode(), PermissionMode::Default);

        let again = d.execute("exit_plan_mode", json!({"plan": "x"}), &request()).await;
        assert_eq!(again.kind(), Some(ErrorKind::ValidationError));
    }

    #[tokio::test]
    async fn test_run_turn_preserves_invocation_order() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let slow = CountingTool::read_only("slow_lookup").with_delay(Duration::from_millis(50));
        let fast = CountingTool::read_only("fast_lookup");
        let write = CountingTool::mutating("save");
        let d = dispatcher(&ws, &[slow.handle(), fast.handle(), write.handle()]);
        let turn = RequestContext::new(RequestKind::Turn);

        let outcomes = d
            .run_turn(
                vec![
                    Invocation::new("slow_lookup", json!({})),
                    Invocation::new("fast_lookup", json!({})),
                    Invocation::new("save", json!({})),
                    Invocation::new("missing", json!({})),
                    Invocation::new("fast_lookup", json!({})),
                ],
                &turn,
            )
            .await;

        let names: Vec<&str> = outcomes.iter().map(|o| o.tool.as_str()).collect();
        assert_eq!(names, ["slow_lookup", "fast_lookup", "save", "missing", "fast_lookup"]);
        assert_eq!(outcomes[3].kind(), Some(ErrorKind::ValidationError));
        assert!(outcomes.iter().all(|o| o.request_id != turn.id()));
        assert!(turn.is_active());
    }

    #[tokio::test]
    async fn test_safe_tools_run_together_unsafe_alone() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let lookup = CountingTool::read_only("lookup").with_delay(Duration::from_millis(100));
        let save = CountingTool::mutating("save").with_delay(Duration::from_millis(30));
        let d = dispatcher(&ws, &[lookup.handle(), save.handle()]);
        let turn = RequestContext::new(RequestKind::Turn);

        let outcomes = d
            .run_turn(
                vec![
                    Invocation::new("lookup", json!({})),
                    Invocation::new("lookup", json!({})),
                    Invocation::new("save", json!({})),
                    Invocation::new("save", json!({})),
                ],
                &turn,
            )
            .await;

        assert!(outcomes.iter().all(DispatchOutcome::is_success));
        assert_eq!(lookup.peak_concurrency(), 2);
        assert_eq!(save.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_exclusive_lane_spans_concurrent_invokes() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let save = CountingTool::mutating("save").with_delay(Duration::from_millis(30));
        let d = dispatcher(&ws, &[save.handle()]);

        let (req_a, req_b) = (request(), request());
        let (a, b) = tokio::join!(
            d.execute("save", json!({}), &req_a),
            d.execute("save", json!({}), &req_b),
        );
        assert!(a.is_success() && b.is_success());
        assert_eq!(save.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_turn_cancels_every_invocation() {
        let ws = TestWorkspace::with_mode(PermissionMode::BypassPermissions);
        let lookup = CountingTool::read_only("lookup");
        let save = CountingTool::mutating("save");
        let d = dispatcher(&ws, &[lookup.handle(), save.handle()]);
        let turn = RequestContext::new(RequestKind::Turn);
        turn.cancel();

        let outcomes = d
            .run_turn(
                vec![Invocation::new("lookup", json!({})), Invocation::new("save", json!({}))],
                &turn,
            )
            .await;
        assert!(outcomes.iter().all(DispatchOutcome::is_cancelled));
        assert_eq!(lookup.calls() + save.calls(), 0);
    }
}
