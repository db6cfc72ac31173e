//! Registry of in-flight requests.
//!
//! The agent loop creates requests through the tracker so that "cancel the
//! current turn" can be expressed as a cancellation of one request id,
//! never as a process-wide flag.

use dashmap::DashMap;
use tracing::debug;

use crate::abort::{RequestContext, RequestId, RequestKind};

/// Tracks active [`RequestContext`]s by id.
#[derive(Debug, Default)]
pub struct RequestTracker {
    active: DashMap<RequestId, RequestContext>,
}

impl RequestTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    /// Create and register a new request.
    #[must_use]
    pub fn create(&self, kind: RequestKind) -> RequestContext {
        let ctx = RequestContext::new(kind);
        self.active.insert(ctx.id(), ctx.clone());
        ctx
    }

    /// Cancel one request. Returns `false` if the id is unknown.
    pub fn cancel(&self, id: RequestId) -> bool {
        let Some(ctx) = self.active.get(&id).map(|entry| entry.value().clone()) else {
            debug!(request_id = %id, "cancel for unknown request");
            return false;
        };
        ctx.cancel();
        true
    }

    /// Complete a request and stop tracking it.
    pub fn complete(&self, id: RequestId) -> bool {
        match self.active.remove(&id) {
            Some((_, ctx)) => {
                ctx.complete();
                true
            },
            None => false,
        }
    }

    /// Look up a tracked request.
    #[must_use]
    pub fn get(&self, id: RequestId) -> Option<RequestContext> {
        self.active.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop entries whose request has already been deactivated elsewhere.
    pub fn prune(&self) -> usize {
        let before = self.active.len();
        self.active.retain(|_, ctx| ctx.is_active());
        before.saturating_sub(self.active.len())
    }

    /// Number of tracked requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no requests are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
