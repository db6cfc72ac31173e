//! Shared and per-call context handed to tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use warden_approval::PermissionModeEngine;
use warden_core::RequestId;
use warden_vfs::{SandboxPolicy, SecureFileService};
use warden_workspace::{Access, PathBoundary};

use crate::error::{ToolError, ToolResult};

/// Default shell timeout (2 minutes).
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(120);
/// Maximum output size in characters before truncation.
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 30_000;

/// Session-wide context available to all tools.
#[derive(Debug)]
pub struct ToolContext {
    /// Workspace root directory.
    pub workspace_root: PathBuf,
    /// Current working directory (persists across bash invocations).
    pub cwd: Arc<RwLock<PathBuf>>,
    /// Granted read/write directories.
    pub boundary: Arc<PathBoundary>,
    /// Sandboxed file operations.
    pub files: Arc<SecureFileService>,
    /// Permission mode state machine.
    pub modes: Arc<PermissionModeEngine>,
    /// Directory `memory_read` serves from.
    pub memory_dir: Option<PathBuf>,
    /// Default timeout for shell commands.
    pub shell_timeout: Duration,
    /// Assistant-facing output ceiling.
    pub max_output_chars: usize,
}

impl ToolContext {
    /// Create a context from already-configured collaborators.
    #[must_use]
    pub fn new(
        workspace_root: PathBuf,
        boundary: Arc<PathBoundary>,
        files: Arc<SecureFileService>,
        modes: Arc<PermissionModeEngine>,
    ) -> Self {
        let cwd = Arc::new(RwLock::new(workspace_root.clone()));
        Self {
            workspace_root,
            cwd,
            boundary,
            files,
            modes,
            memory_dir: None,
            shell_timeout: DEFAULT_SHELL_TIMEOUT,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }

    /// Context with read/write granted on `root` and a file service rooted there.
    #[must_use]
    pub fn for_workspace(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(
            root.clone(),
            Arc::new(PathBoundary::with_root(root.clone())),
            Arc::new(SecureFileService::with_cwd(
                root.clone(),
                SandboxPolicy::rooted(root),
            )),
            Arc::new(PermissionModeEngine::default()),
        )
    }

    /// Set the memory directory.
    #[must_use]
    pub fn with_memory_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.memory_dir = Some(dir.into());
        self
    }

    /// Set the default shell timeout.
    #[must_use]
    pub fn with_shell_timeout(mut self, timeout: Duration) -> Self {
        self.shell_timeout = timeout;
        self
    }

    /// Set the output ceiling.
    #[must_use]
    pub fn with_max_output_chars(mut self, max: usize) -> Self {
        self.max_output_chars = max;
        self
    }

    /// Resolve a tool-supplied path against the workspace root.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    /// Resolve `path` and require it to be inside the `access` allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::OutsideBoundary`] if the path is not granted.
    pub fn check_access(&self, access: Access, path: &str) -> ToolResult<PathBuf> {
        let resolved = self.resolve(path);
        if self.boundary.is_allowed(access, &resolved) {
            Ok(resolved)
        } else {
            Err(ToolError::OutsideBoundary {
                access,
                path: PathBuf::from(path),
            })
        }
    }
}

/// Per-invocation context.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Shared session context.
    pub env: Arc<ToolContext>,
    /// Request this invocation belongs to.
    pub request_id: RequestId,
    /// Fires when the request is cancelled.
    pub cancel: CancellationToken,
}

impl CallContext {
    /// Bundle a shared context with a request's cancellation signal.
    #[must_use]
    pub fn new(env: Arc<ToolContext>, request_id: RequestId, cancel: CancellationToken) -> Self {
        Self {
            env,
            request_id,
            cancel,
        }
    }

    /// A context with a fresh, never-cancelled signal.
    #[must_use]
    pub fn detached(env: Arc<ToolContext>) -> Self {
        Self::new(env, RequestId::new(), CancellationToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        let ctx = ToolContext::for_workspace("/srv/project");
        assert_eq!(ctx.resolve("src/lib.rs"), PathBuf::from("/srv/project/src/lib.rs"));
        assert_eq!(ctx.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_check_access() {
        let ctx = ToolContext::for_workspace("/srv/project");
        assert!(ctx.check_access(Access::Write, "notes.md").is_ok());
        let err = ctx.check_access(Access::Read, "/etc/passwd").unwrap_err();
        assert!(matches!(err, ToolError::OutsideBoundary { access: Access::Read, .. }));
    }
}
