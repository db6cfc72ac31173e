//! Request-scoped cancellation.
//!
//! Every top-level operation (an interactive turn, a tool invocation, a
//! background task) gets its own [`RequestContext`] carrying a fresh
//! cancellation signal. Code that needs to observe cancellation takes an
//! [`AbortBarrier`] bound to exactly one context, so cancelling one request
//! can never be observed by another.
//!
//! # Lifecycle
//!
//! 1. [`RequestContext::new`] allocates a unique id and an untripped signal.
//! 2. [`RequestContext::cancel`] trips the signal and fires registered listeners.
//! 3. [`RequestContext::complete`] or [`AbortBarrier::cleanup`] deactivates the
//!    context. No listener fires after that, and [`AbortBarrier::check_abort`]
//!    reports `false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// What kind of operation a request represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// A user-triggered interactive turn.
    Turn,
    /// A single tool invocation.
    ToolInvocation,
    /// A background task.
    Background,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Turn => write!(f, "turn"),
            Self::ToolInvocation => write!(f, "tool_invocation"),
            Self::Background => write!(f, "background"),
        }
    }
}

type AbortCallback = Box<dyn FnOnce() + Send + 'static>;

struct Listener {
    barrier: u64,
    callback: AbortCallback,
}

struct ContextState {
    id: RequestId,
    kind: RequestKind,
    started_at: DateTime<Utc>,
    token: CancellationToken,
    active: AtomicBool,
    next_barrier: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
    children: Mutex<Vec<Weak<ContextState>>>,
}

impl ContextState {
    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|e| {
            warn!(request_id = %self.id, "listener registry lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }

    fn children(&self) -> MutexGuard<'_, Vec<Weak<ContextState>>> {
        self.children.lock().unwrap_or_else(|e| {
            warn!(request_id = %self.id, "child registry lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }
}

/// Per-request cancellation scope.
///
/// Cloning yields another handle to the *same* request (e.g. for a tracker
/// that needs to cancel it by id); it never creates a new request.
#[derive(Clone)]
pub struct RequestContext {
    state: Arc<ContextState>,
}

impl RequestContext {
    /// Create a fresh, active request context.
    #[must_use]
    pub fn new(kind: RequestKind) -> Self {
        Self::with_token(kind, CancellationToken::new())
    }

    /// Create a request nested under this one.
    ///
    /// Cancelling this request cancels the child too, firing the child's
    /// listeners. Cancelling or completing the child leaves this request
    /// untouched.
    #[must_use]
    pub fn child(&self, kind: RequestKind) -> Self {
        let child = Self::with_token(kind, self.state.token.child_token());
        {
            let mut children = self.state.children();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child.state));
        }
        debug!(request_id = %child.id(), parent = %self.state.id, "child request created");
        child
    }

    fn with_token(kind: RequestKind, token: CancellationToken) -> Self {
        let state = ContextState {
            id: RequestId::new(),
            kind,
            started_at: Utc::now(),
            token,
            active: AtomicBool::new(true),
            next_barrier: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
        };
        debug!(request_id = %state.id, kind = %kind, "request created");
        Self {
            state: Arc::new(state),
        }
    }

    /// The request id.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.state.id
    }

    /// The request kind.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.state.kind
    }

    /// When the request started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.state.started_at
    }

    /// Milliseconds since the request started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.state.started_at)
            .num_milliseconds()
    }

    /// Whether the request has not yet completed or been cleaned up.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    /// Whether the cancellation signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.token.is_cancelled()
    }

    /// A handle on this request's cancellation signal.
    ///
    /// Lets an operation observe cancellation from a `'static` task without
    /// holding the context itself.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.state.token.clone()
    }

    /// Trip this request's cancellation signal.
    ///
    /// Fires every listener registered through this request's barriers,
    /// then cancels every live child the same way. Has no effect on an
    /// inactive request.
    pub fn cancel(&self) {
        if !self.is_active() {
            debug!(request_id = %self.state.id, "cancel ignored: request inactive");
            return;
        }
        self.state.token.cancel();
        let fired = std::mem::take(&mut *self.state.listeners());
        debug!(
            request_id = %self.state.id,
            listeners = fired.len(),
            "request cancelled"
        );
        for listener in fired {
            (listener.callback)();
        }

        let children = std::mem::take(&mut *self.state.children());
        for state in children.iter().filter_map(Weak::upgrade) {
            Self { state }.cancel();
        }
    }

    /// Mark the request finished.
    ///
    /// Drops every pending listener. Returns `true` only for the call that
    /// performed the transition.
    pub fn complete(&self) -> bool {
        let was_active = self.state.active.swap(false, Ordering::AcqRel);
        if was_active {
            self.state.listeners().clear();
            debug!(
                request_id = %self.state.id,
                elapsed_ms = self.elapsed_ms(),
                "request completed"
            );
        }
        was_active
    }

    /// Create a barrier bound to this request.
    #[must_use]
    pub fn create_barrier(&self) -> AbortBarrier {
        let barrier = self.state.next_barrier.fetch_add(1, Ordering::Relaxed);
        AbortBarrier {
            context: self.clone(),
            barrier,
            cleaned: AtomicBool::new(false),
        }
    }

    /// Tracing span for this request.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.state.id,
            kind = %self.state.kind,
        )
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.state.listeners().len()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("active", &self.is_active())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Cancellation view bound to exactly one [`RequestContext`].
pub struct AbortBarrier {
    context: RequestContext,
    barrier: u64,
    cleaned: AtomicBool,
}

impl AbortBarrier {
    /// Id of the request this barrier observes.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.context.id()
    }

    /// `true` iff the bound request is still active and its signal has fired.
    #[must_use]
    pub fn check_abort(&self) -> bool {
        self.context.is_active() && self.context.is_cancelled()
    }

    /// Register a callback to run when the bound request is cancelled.
    ///
    /// If the request is already cancelled (and still active) the callback
    /// runs immediately. Registration after cleanup is ignored.
    pub fn on_abort<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.cleaned.load(Ordering::Acquire) {
            return;
        }
        let mut listeners = self.context.state.listeners();
        // Both checked under the lock: `complete` clears the list after
        // deactivating, `cancel` trips the token before draining.
        if !self.context.is_active() {
            return;
        }
        if self.context.is_cancelled() {
            drop(listeners);
            callback();
            return;
        }
        listeners.push(Listener {
            barrier: self.barrier,
            callback: Box::new(callback),
        });
    }

    /// Wait until the bound request is cancelled.
    ///
    /// Never resolves for a request that completes without cancellation, so
    /// callers race it against their own work.
    pub async fn aborted(&self) {
        self.context.state.token.cancelled().await;
    }

    /// Unregister this barrier's listeners and deactivate the bound request.
    ///
    /// Idempotent.
    pub fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return;
        }
        self.context
            .state
            .listeners()
            .retain(|l| l.barrier != self.barrier);
        self.context.complete();
    }
}

impl fmt::Debug for AbortBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortBarrier")
            .field("request_id", &self.context.id())
            .field("cleaned", &self.cleaned.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_new_context_is_active() {
        let ctx = RequestContext::new(RequestKind::Turn);
        assert!(ctx.is_active());
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.kind(), RequestKind::Turn);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = RequestContext::new(RequestKind::ToolInvocation);
        let b = RequestContext::new(RequestKind::ToolInvocation);
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("req:"));
    }

    #[test]
    fn test_barriers_are_isolated() {
        let r1 = RequestContext::new(RequestKind::ToolInvocation);
        let r2 = RequestContext::new(RequestKind::ToolInvocation);
        let b1 = r1.create_barrier();
        let b2 = r2.create_barrier();

        r1.cancel();
        assert!(b1.check_abort());
        assert!(!b2.check_abort());

        let r3 = RequestContext::new(RequestKind::ToolInvocation);
        let r4 = RequestContext::new(RequestKind::ToolInvocation);
        let b3 = r3.create_barrier();
        let b4 = r4.create_barrier();
        r4.cancel();
        assert!(!b3.check_abort());
        assert!(b4.check_abort());
    }

    #[test]
    fn test_listener_fires_only_for_own_request() {
        let r1 = RequestContext::new(RequestKind::ToolInvocation);
        let r2 = RequestContext::new(RequestKind::ToolInvocation);
        let fired_1 = Arc::new(AtomicUsize::new(0));
        let fired_2 = Arc::new(AtomicUsize::new(0));

        let b1 = r1.create_barrier();
        let b2 = r2.create_barrier();
        let f1 = Arc::clone(&fired_1);
        b1.on_abort(move || {
            f1.fetch_add(1, Ordering::SeqCst);
        });
        let f2 = Arc::clone(&fired_2);
        b2.on_abort(move || {
            f2.fetch_add(1, Ordering::SeqCst);
        });

        r1.cancel();
        assert_eq!(fired_1.load(Ordering::SeqCst), 1);
        assert_eq!(fired_2.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cleanup_reports_no_abort() {
        let ctx = RequestContext::new(RequestKind::ToolInvocation);
        let barrier = ctx.create_barrier();
        ctx.cancel();
        assert!(barrier.check_abort());

        barrier.cleanup();
        assert!(!ctx.is_active());
        assert!(!barrier.check_abort());
    }

    #[test]
    fn test_cleanup_is_idempotent_and_unregisters() {
        let ctx = RequestContext::new(RequestKind::ToolInvocation);
        let barrier = ctx.create_barrier();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        barrier.on_abort(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ctx.listener_count(), 1);

        barrier.cleanup();
        barrier.cleanup();
        assert_eq!(ctx.listener_count(), 0);

        ctx.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_on_abort_after_cancel_fires_immediately() {
        let ctx = RequestContext::new(RequestKind::ToolInvocation);
        let barrier = ctx.create_barrier();
        ctx.cancel();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        barrier.on_abort(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_abort_after_cleanup_is_ignored() {
        let ctx = RequestContext::new(RequestKind::ToolInvocation);
        let barrier = ctx.create_barrier();
        barrier.cleanup();

        barrier.on_abort(|| panic!("must not fire"));
        ctx.cancel();
        assert_eq!(ctx.listener_count(), 0);
    }

    #[test]
    fn test_child_follows_parent_not_siblings() {
        let turn = RequestContext::new(RequestKind::Turn);
        let a = turn.child(RequestKind::ToolInvocation);
        let b = turn.child(RequestKind::ToolInvocation);
        let (ba, bb) = (a.create_barrier(), b.create_barrier());

        a.cancel();
        assert!(ba.check_abort());
        assert!(!bb.check_abort());
        assert!(!turn.is_cancelled());

        ba.cleanup();
        assert!(turn.is_active());

        turn.cancel();
        assert!(bb.check_abort());
    }

    #[test]
    fn test_parent_cancel_fires_child_listeners() {
        let turn = RequestContext::new(RequestKind::Turn);
        let child = turn.child(RequestKind::ToolInvocation);
        let done = turn.child(RequestKind::ToolInvocation);
        let barrier = child.create_barrier();
        let finished = done.create_barrier();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        barrier.on_abort(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        finished.on_abort(|| panic!("completed child must not fire"));
        finished.cleanup();

        turn.cancel();
        assert!(barrier.check_abort());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(child.listener_count(), 0);
    }

    #[test]
    fn test_grandchild_listeners_fire_on_root_cancel() {
        let root = RequestContext::new(RequestKind::Turn);
        let mid = root.child(RequestKind::ToolInvocation);
        let leaf = mid.child(RequestKind::Background);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        leaf.create_barrier().on_abort(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        root.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_children_are_pruned() {
        let turn = RequestContext::new(RequestKind::Turn);
        for _ in 0..8 {
            drop(turn.child(RequestKind::ToolInvocation));
        }
        let _live = turn.child(RequestKind::ToolInvocation);
        assert_eq!(turn.state.children().len(), 1);
    }

    #[test]
    fn test_on_abort_after_complete_is_dropped() {
        let ctx = RequestContext::new(RequestKind::ToolInvocation);
        let barrier = ctx.create_barrier();
        assert!(ctx.complete());

        barrier.on_abort(|| panic!("must not fire"));
        assert_eq!(ctx.listener_count(), 0);
    }

    #[test]
    fn test_complete_transitions_once() {
        let ctx = RequestContext::new(RequestKind::Background);
        assert!(ctx.complete());
        assert!(!ctx.complete());
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_cancel_after_complete_is_noop() {
        let ctx = RequestContext::new(RequestKind::Turn);
        let barrier = ctx.create_barrier();
        ctx.complete();
        ctx.cancel();
        assert!(!ctx.is_cancelled());
        assert!(!barrier.check_abort());
    }

    #[tokio::test]
    async fn test_aborted_resolves_on_cancel() {
        let ctx = RequestContext::new(RequestKind::ToolInvocation);
        let barrier = ctx.create_barrier();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            canceller.cancel();
        });
        tokio::time::timeout(std::time::Duration::from_secs(2), barrier.aborted())
            .await
            .unwrap();
        assert!(barrier.check_abort());
    }

    #[tokio::test]
    async fn test_concurrent_cancellation_same_tick() {
        let r1 = RequestContext::new(RequestKind::ToolInvocation);
        let r2 = RequestContext::new(RequestKind::ToolInvocation);
        let r3 = RequestContext::new(RequestKind::ToolInvocation);
        let b1 = r1.create_barrier();
        let b2 = r2.create_barrier();
        let b3 = r3.create_barrier();

        let (c1, c2) = (r1.clone(), r2.clone());
        let h1 = tokio::spawn(async move { c1.cancel() });
        let h2 = tokio::spawn(async move { c2.cancel() });
        h1.await.unwrap();
        h2.await.unwrap();

        assert!(b1.check_abort());
        assert!(b2.check_abort());
        assert!(!b3.check_abort());
    }
}
