//! Mock tools and approval handlers.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use warden_approval::{ApprovalDecision, ApprovalHandler, ApprovalRequest};
use warden_core::ToolKind;
use warden_tools::{
    CallContext, Tool, ToolContext, ToolError, ToolEvent, ToolOutput, ToolResult, ToolStream,
    once_result,
};

// ---------------------------------------------------------------------------
// CountingTool
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    validations: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// A tool that counts how often its operation actually runs.
///
/// Cloning shares the counters, so a test can keep one handle and register
/// another. Input `{"invalid": true}` fails validation.
#[derive(Debug, Clone)]
pub struct CountingTool {
    name: String,
    kind: ToolKind,
    read_only: bool,
    concurrency_safe: bool,
    delay: Duration,
    counters: Arc<Counters>,
}

impl CountingTool {
    fn build(name: impl Into<String>, kind: ToolKind, read_only: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            read_only,
            concurrency_safe: read_only,
            delay: Duration::ZERO,
            counters: Arc::new(Counters::default()),
        }
    }

    /// A mutating, exclusive tool.
    #[must_use]
    pub fn mutating(name: impl Into<String>) -> Self {
        Self::build(name, ToolKind::Shell, false)
    }

    /// A read-only, concurrency-safe tool.
    #[must_use]
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::build(name, ToolKind::Search, true)
    }

    /// Set the tool kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ToolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Declare a mutating tool safe to run concurrently.
    #[must_use]
    pub fn concurrency_safe(mut self) -> Self {
        self.concurrency_safe = true;
        self
    }

    /// Make each run take `delay` (cancellable).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shareable handle for registration.
    #[must_use]
    pub fn handle(&self) -> Arc<dyn Tool> {
        Arc::new(self.clone())
    }

    /// How many times the operation started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// How many times input validation ran.
    #[must_use]
    pub fn validations(&self) -> usize {
        self.counters.validations.load(Ordering::SeqCst)
    }

    /// Highest number of runs observed in flight at once.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Counts its own invocations"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_concurrency_safe(&self) -> bool {
        self.concurrency_safe
    }

    async fn validate_input(&self, input: &Value, _ctx: &ToolContext) -> ToolResult<()> {
        self.counters.validations.fetch_add(1, Ordering::SeqCst);
        if input.get("invalid").and_then(Value::as_bool) == Some(true) {
            return Err(ToolError::InvalidArguments("input marked invalid".into()));
        }
        Ok(())
    }

    fn call(&self, _input: Value, ctx: CallContext) -> ToolStream {
        let counters = Arc::clone(&self.counters);
        let name = self.name.clone();
        let delay = self.delay;
        once_result(async move {
            let run = counters.calls.fetch_add(1, Ordering::SeqCst);
            let now = counters.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
            counters.peak.fetch_max(now, Ordering::SeqCst);

            let finished = tokio::select! {
                () = ctx.cancel.cancelled() => false,
                () = tokio::time::sleep(delay) => true,
            };
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            if !finished {
                return Err(ToolError::Cancelled);
            }
            Ok(ToolOutput::new(json!({"run": run}), format!("{name} ran")))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        format!("{}({input})", self.name)
    }
}

// ---------------------------------------------------------------------------
// SlowStreamingTool
// ---------------------------------------------------------------------------

/// Sets a flag when the tool's stream is dropped.
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A read-only tool that emits a progress line per interval until cancelled.
///
/// With [`SlowStreamingTool::finish_after`] it ends with a result instead.
#[derive(Debug, Clone)]
pub struct SlowStreamingTool {
    name: String,
    interval: Duration,
    max_ticks: Option<usize>,
    ticks: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl SlowStreamingTool {
    /// A tool ticking every `interval`.
    #[must_use]
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            max_ticks: None,
            ticks: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Finish with a result after `ticks` progress events.
    #[must_use]
    pub fn finish_after(mut self, ticks: usize) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Shareable handle for registration.
    #[must_use]
    pub fn handle(&self) -> Arc<dyn Tool> {
        Arc::new(self.clone())
    }

    /// Progress events emitted so far.
    #[must_use]
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Whether the last stream was dropped (run finished or abandoned).
    #[must_use]
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

struct StreamState {
    emitted: usize,
    done: bool,
    ctx: CallContext,
    _release: ReleaseFlag,
}

#[async_trait]
impl Tool for SlowStreamingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Streams progress until cancelled"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn is_concurrency_safe(&self) -> bool {
        true
    }

    async fn validate_input(&self, _input: &Value, _ctx: &ToolContext) -> ToolResult<()> {
        Ok(())
    }

    fn call(&self, _input: Value, ctx: CallContext) -> ToolStream {
        self.released.store(false, Ordering::SeqCst);
        let state = StreamState {
            emitted: 0,
            done: false,
            ctx,
            _release: ReleaseFlag(Arc::clone(&self.released)),
        };
        let interval = self.interval;
        let max_ticks = self.max_ticks;
        let ticks = Arc::clone(&self.ticks);

        stream::unfold(state, move |mut state| {
            let ticks = Arc::clone(&ticks);
            async move {
                if state.done {
                    return None;
                }
                tokio::select! {
                    () = state.ctx.cancel.cancelled() => {
                        state.done = true;
                        Some((Err(ToolError::Cancelled), state))
                    },
                    () = tokio::time::sleep(interval) => {
                        if max_ticks.is_some_and(|max| state.emitted >= max) {
                            state.done = true;
                            let output = ToolOutput::new(json!({"ticks": state.emitted}), "done");
                            return Some((Ok(ToolEvent::Result(output)), state));
                        }
                        state.emitted = state.emitted.saturating_add(1);
                        ticks.fetch_add(1, Ordering::SeqCst);
                        Some((Ok(ToolEvent::Progress(format!("tick {}", state.emitted))), state))
                    },
                }
            }
        })
        .boxed()
    }

    fn render_tool_use_message(&self, _input: &Value) -> String {
        self.name.clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedApprovalHandler
// ---------------------------------------------------------------------------

/// Approval handler answering from a queue of scripted decisions.
///
/// When the queue is empty it answers with the fallback decision, or not
/// at all if none is set.
#[derive(Debug, Clone)]
pub struct ScriptedApprovalHandler {
    decisions: Arc<Mutex<VecDeque<ApprovalDecision>>>,
    fallback: Option<ApprovalDecision>,
    requests: Arc<Mutex<Vec<ApprovalRequest>>>,
    available: Arc<AtomicBool>,
    delay: Duration,
}

impl ScriptedApprovalHandler {
    /// Answer with `decisions` in order.
    #[must_use]
    pub fn new(decisions: impl IntoIterator<Item = ApprovalDecision>) -> Self {
        Self {
            decisions: Arc::new(Mutex::new(decisions.into_iter().collect())),
            fallback: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
            delay: Duration::ZERO,
        }
    }

    /// Approve every request once.
    #[must_use]
    pub fn approving() -> Self {
        Self::new([]).with_fallback(ApprovalDecision::ApproveOnce)
    }

    /// Deny every request.
    #[must_use]
    pub fn denying(reason: impl Into<String>) -> Self {
        Self::new([]).with_fallback(ApprovalDecision::Deny {
            reason: reason.into(),
        })
    }

    /// Decision used once the queue is empty.
    #[must_use]
    pub fn with_fallback(mut self, decision: ApprovalDecision) -> Self {
        self.fallback = Some(decision);
        self
    }

    /// Wait `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Toggle availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of prompts received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Prompts received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApprovalRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ApprovalHandler for ScriptedApprovalHandler {
    async fn request_approval(&self, request: ApprovalRequest) -> Option<ApprovalDecision> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self
            .decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.or_else(|| self.fallback.clone())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
