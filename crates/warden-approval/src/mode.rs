//! Permission modes and their pre-authorization rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use warden_core::ToolDescriptor;

use crate::error::ApprovalError;

/// The active permission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Read-only tools run; every mutating action asks first.
    #[default]
    Default,
    /// File edits run without asking; shell and external tools still ask.
    AcceptEdits,
    /// Read-only exploration. Mutating tools are blocked outright.
    Plan,
    /// Everything runs without asking.
    BypassPermissions,
}

/// Display metadata for a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    /// Short label.
    pub label: &'static str,
    /// Single-glyph indicator.
    pub icon: &'static str,
    /// Terminal color name.
    pub color: &'static str,
    /// One-line explanation.
    pub description: &'static str,
}

/// What a mode says about running a tool before any prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeVerdict {
    /// Runs without asking.
    PreAuthorized,
    /// Runs only after the user approves (if the invocation needs permission).
    RequiresApproval,
    /// Never runs in this mode; no prompt is shown.
    Blocked,
}

const CYCLE_ORDER: [PermissionMode; 4] = [
    PermissionMode::Default,
    PermissionMode::AcceptEdits,
    PermissionMode::Plan,
    PermissionMode::BypassPermissions,
];

impl PermissionMode {
    /// The order a user cycles through modes.
    #[must_use]
    pub fn cycle_order() -> &'static [PermissionMode] {
        &CYCLE_ORDER
    }

    /// The mode after this one in [`Self::cycle_order`], wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        CYCLE_ORDER
            .iter()
            .cycle()
            .skip_while(|m| **m != self)
            .nth(1)
            .copied()
            .unwrap_or_default()
    }

    /// Stable camelCase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }

    /// Display metadata.
    #[must_use]
    pub fn config(self) -> ModeConfig {
        match self {
            Self::Default => ModeConfig {
                label: "Default",
                icon: "○",
                color: "white",
                description: "Ask before every mutating action",
            },
            Self::AcceptEdits => ModeConfig {
                label: "Accept Edits",
                icon: "✎",
                color: "green",
                description: "File edits run without asking; shell commands still ask",
            },
            Self::Plan => ModeConfig {
                label: "Plan",
                icon: "⏸",
                color: "cyan",
                description: "Read-only exploration; mutating tools are blocked",
            },
            Self::BypassPermissions => ModeConfig {
                label: "Bypass Permissions",
                icon: "⚠",
                color: "red",
                description: "Every tool runs without asking",
            },
        }
    }

    /// Pre-authorization rule for `tool` under this mode.
    #[must_use]
    pub fn authorize(self, tool: &ToolDescriptor) -> ModeVerdict {
        if tool.read_only {
            return ModeVerdict::PreAuthorized;
        }
        match self {
            Self::BypassPermissions => ModeVerdict::PreAuthorized,
            Self::Plan => ModeVerdict::Blocked,
            Self::AcceptEdits if tool.is_file_edit() => ModeVerdict::PreAuthorized,
            Self::AcceptEdits | Self::Default => ModeVerdict::RequiresApproval,
        }
    }

    /// Whether `tool` runs without a prompt under this mode.
    #[must_use]
    pub fn pre_authorizes(self, tool: &ToolDescriptor) -> bool {
        self.authorize(tool) == ModeVerdict::PreAuthorized
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CYCLE_ORDER
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ApprovalError::UnknownMode(s.to_string()))
    }
}
