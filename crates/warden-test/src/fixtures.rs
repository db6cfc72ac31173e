//! Filesystem fixtures and logging helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use warden_approval::{PermissionMode, PermissionModeEngine};
use warden_config::Config;
use warden_tools::ToolContext;
use warden_vfs::{SandboxPolicy, SecureFileService};
use warden_workspace::PathBoundary;

/// A temporary workspace with a granted boundary and a file service
/// rooted at it.
///
/// The directory is removed when the fixture is dropped.
#[derive(Debug)]
pub struct TestWorkspace {
    _dir: TempDir,
    root: PathBuf,
    boundary: Arc<PathBoundary>,
    files: Arc<SecureFileService>,
    modes: Arc<PermissionModeEngine>,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create a workspace in `default` mode.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(PermissionMode::Default)
    }

    /// Create a workspace starting in `mode`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn with_mode(mode: PermissionMode) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        // Canonical so boundary checks agree with symlinked temp roots.
        let root = dir
            .path()
            .canonicalize()
            .expect("failed to canonicalize temp dir");
        Self {
            boundary: Arc::new(PathBoundary::with_root(&root)),
            files: Arc::new(SecureFileService::with_cwd(
                root.clone(),
                SandboxPolicy::rooted(root.clone()),
            )),
            modes: Arc::new(PermissionModeEngine::new(mode)),
            root,
            _dir: dir,
        }
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `rel` inside the workspace.
    #[must_use]
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Write a file, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write(&self, rel: impl AsRef<Path>, content: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write file");
        path
    }

    /// Read a file.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read.
    #[must_use]
    pub fn read(&self, rel: impl AsRef<Path>) -> String {
        std::fs::read_to_string(self.path(rel)).expect("failed to read file")
    }

    /// Whether `rel` exists.
    #[must_use]
    pub fn exists(&self, rel: impl AsRef<Path>) -> bool {
        self.path(rel).exists()
    }

    /// The boundary.
    #[must_use]
    pub fn boundary(&self) -> &Arc<PathBoundary> {
        &self.boundary
    }

    /// The file service.
    #[must_use]
    pub fn files(&self) -> &Arc<SecureFileService> {
        &self.files
    }

    /// The mode engine.
    #[must_use]
    pub fn modes(&self) -> &Arc<PermissionModeEngine> {
        &self.modes
    }

    /// Tool environment over this workspace's services.
    #[must_use]
    pub fn context(&self) -> Arc<ToolContext> {
        Arc::new(ToolContext::new(
            self.root.clone(),
            Arc::clone(&self.boundary),
            Arc::clone(&self.files),
            Arc::clone(&self.modes),
        ))
    }

    /// Configuration rooted at this workspace.
    #[must_use]
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.workspace.root = Some(self.root.clone());
        config
    }
}

/// Install a test-writer subscriber with `filter`. Later calls are no-ops.
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_something() {
///     warden_test::setup_test_logging("warden_runtime=debug");
/// }
/// ```
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}
