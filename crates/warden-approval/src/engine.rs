//! Session-wide permission mode state machine.
//!
//! Exactly one mode is active at a time. The user cycles through
//! [`PermissionMode::cycle_order`]; tools and the orchestrator can force a
//! specific mode (leaving plan mode is the common case). Every change bumps a
//! monotonic transition counter that UIs may display but nothing decides on.

use tokio::sync::watch;
use tracing::info;
use warden_core::ToolDescriptor;

use crate::mode::{ModeVerdict, PermissionMode};

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSnapshot {
    /// The active mode.
    pub mode: PermissionMode,
    /// Number of mode changes since the engine was created.
    pub transitions: u64,
}

/// The permission mode state machine.
#[derive(Debug)]
pub struct PermissionModeEngine {
    state: watch::Sender<ModeSnapshot>,
}

impl Default for PermissionModeEngine {
    fn default() -> Self {
        Self::new(PermissionMode::Default)
    }
}

impl PermissionModeEngine {
    /// Create an engine starting in `initial`.
    #[must_use]
    pub fn new(initial: PermissionMode) -> Self {
        let (state, _) = watch::channel(ModeSnapshot {
            mode: initial,
            transitions: 0,
        });
        Self { state }
    }

    /// The active mode.
    #[must_use]
    pub fn current_mode(&self) -> PermissionMode {
        self.state.borrow().mode
    }

    /// The active mode together with the transition counter.
    #[must_use]
    pub fn snapshot(&self) -> ModeSnapshot {
        *self.state.borrow()
    }

    /// Number of mode changes so far.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.state.borrow().transitions
    }

    /// Advance to the next mode in cycle order and return it.
    pub fn cycle_mode(&self) -> PermissionMode {
        let mut next = PermissionMode::Default;
        self.state.send_modify(|snap| {
            let from = snap.mode;
            snap.mode = from.next();
            snap.transitions = snap.transitions.saturating_add(1);
            next = snap.mode;
            info!(from = %from, to = %snap.mode, transitions = snap.transitions, "permission mode cycled");
        });
        next
    }

    /// Switch to `mode`. Returns the previous mode.
    ///
    /// Forcing the mode that is already active is a no-op and does not
    /// count as a transition.
    pub fn force_mode(&self, mode: PermissionMode) -> PermissionMode {
        let mut previous = mode;
        self.state.send_if_modified(|snap| {
            previous = snap.mode;
            if snap.mode == mode {
                return false;
            }
            snap.mode = mode;
            snap.transitions = snap.transitions.saturating_add(1);
            info!(from = %previous, to = %mode, transitions = snap.transitions, "permission mode forced");
            true
        });
        previous
    }

    /// Leave plan mode for default. Returns `false` if plan mode was not active.
    pub fn exit_plan_mode(&self) -> bool {
        let mut exited = false;
        self.state.send_if_modified(|snap| {
            if snap.mode != PermissionMode::Plan {
                return false;
            }
            snap.mode = PermissionMode::Default;
            snap.transitions = snap.transitions.saturating_add(1);
            exited = true;
            info!(transitions = snap.transitions, "exited plan mode");
            true
        });
        exited
    }

    /// Pre-authorization verdict for `tool` under the active mode.
    #[must_use]
    pub fn authorize(&self, tool: &ToolDescriptor) -> ModeVerdict {
        self.current_mode().authorize(tool)
    }

    /// Watch mode changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ModeSnapshot> {
        self.state.subscribe()
    }
}
