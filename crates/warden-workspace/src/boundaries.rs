//! Read/write allow-list boundary checking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::normalize::{is_within, normalize_path};

/// Which allow-list a path is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Reading files or listing directories.
    Read,
    /// Creating, modifying or deleting files.
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Session directory boundary.
///
/// Holds two independent, minimal sets of granted directories. Mutation is
/// rare (session start, explicit grants) and takes a plain exclusive lock.
#[derive(Debug)]
pub struct PathBoundary {
    /// Base for resolving relative paths.
    cwd: PathBuf,
    read: RwLock<BTreeSet<PathBuf>>,
    write: RwLock<BTreeSet<PathBuf>>,
}

impl PathBoundary {
    /// Create an empty boundary resolving relative paths against `cwd`.
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            read: RwLock::new(BTreeSet::new()),
            write: RwLock::new(BTreeSet::new()),
        }
    }

    /// Create a boundary with read and write granted on `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let boundary = Self::new(root.clone());
        boundary.grant_read(&root);
        boundary.grant_write(&root);
        boundary
    }

    /// The directory relative paths resolve against.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve a path to its absolute, normalized, comparison form.
    ///
    /// Relative paths resolve against the boundary's cwd, `.`/`..` are
    /// folded, symlinks in the existing prefix are resolved, and case is
    /// folded on case-insensitive platforms.
    #[must_use]
    pub fn normalize(&self, path: impl AsRef<Path>) -> PathBuf {
        normalize_path(&self.cwd, path.as_ref())
    }

    /// Grant read access to `dir` and everything under it.
    ///
    /// Returns `false` when an existing grant already covers `dir`.
    pub fn grant_read(&self, dir: impl AsRef<Path>) -> bool {
        self.grant(Access::Read, dir.as_ref())
    }

    /// Grant write access to `dir` and everything under it.
    ///
    /// Returns `false` when an existing grant already covers `dir`.
    pub fn grant_write(&self, dir: impl AsRef<Path>) -> bool {
        self.grant(Access::Write, dir.as_ref())
    }

    /// Whether `path` is equal to or under a read grant.
    #[must_use]
    pub fn is_read_allowed(&self, path: impl AsRef<Path>) -> bool {
        self.is_allowed(Access::Read, path.as_ref())
    }

    /// Whether `path` is equal to or under a write grant.
    #[must_use]
    pub fn is_write_allowed(&self, path: impl AsRef<Path>) -> bool {
        self.is_allowed(Access::Write, path.as_ref())
    }

    /// Check `path` against the allow-list for `access`.
    #[must_use]
    pub fn is_allowed(&self, access: Access, path: &Path) -> bool {
        let normalized = self.normalize(path);
        let set = self.set(access).read().unwrap_or_else(|e| {
            warn!("PathBoundary read lock poisoned, recovering");
            PoisonError::into_inner(e)
        });
        let allowed = set.iter().any(|root| is_within(root, &normalized));
        debug!(
            path = %path.display(),
            normalized = %normalized.display(),
            %access,
            allowed,
            "Checking path against boundary"
        );
        allowed
    }

    /// Snapshot of the granted directories for `access`.
    #[must_use]
    pub fn roots(&self, access: Access) -> Vec<PathBuf> {
        let set = self
            .set(access)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        set.iter().cloned().collect()
    }

    /// Remove every grant.
    pub fn clear(&self) {
        for access in [Access::Read, Access::Write] {
            self.set(access)
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    /// Uniform user-facing message for a denied path.
    #[must_use]
    pub fn denial_message(&self, access: Access, path: &Path) -> String {
        format!(
            "Path is outside allowed {access} directories: {}",
            path.display()
        )
    }

    fn grant(&self, access: Access, dir: &Path) -> bool {
        let normalized = self.normalize(dir);
        let mut set = self.set(access).write().unwrap_or_else(|e| {
            warn!("PathBoundary write lock poisoned, recovering");
            PoisonError::into_inner(e)
        });

        if set.iter().any(|root| is_within(root, &normalized)) {
            debug!(dir = %normalized.display(), %access, "grant already covered");
            return false;
        }

        // Keep the set minimal: the new grant subsumes its descendants.
        set.retain(|root| !is_within(&normalized, root));
        set.insert(normalized.clone());
        info!(dir = %normalized.display(), %access, "granted directory");
        true
    }

    fn set(&self, access: Access) -> &RwLock<BTreeSet<PathBuf>> {
        match access {
            Access::Read => &self.read,
            Access::Write => &self.write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_grant_and_contain() {
        let boundary = PathBoundary::new("/");
        boundary.grant_read("/home/app");

        assert!(boundary.is_read_allowed("/home/app"));
        assert!(boundary.is_read_allowed("/home/app/src/main.rs"));
        assert!(!boundary.is_read_allowed("/home"));
        assert!(!boundary.is_read_allowed("/home/other"));
    }

    #[test]
    fn test_sibling_prefix_rejected() {
        let boundary = PathBoundary::new("/");
        boundary.grant_read("/home/app-old");
        assert!(!boundary.is_read_allowed("/home/app"));

        let boundary = PathBoundary::new("/");
        boundary.grant_read("/home/app");
        assert!(!boundary.is_read_allowed("/home/app-old/file.txt"));
    }

    #[test]
    fn test_read_and_write_independent() {
        let boundary = PathBoundary::new("/");
        boundary.grant_read("/srv/data");

        assert!(boundary.is_read_allowed("/srv/data/x"));
        assert!(!boundary.is_write_allowed("/srv/data/x"));
    }

    #[test]
    fn test_parent_grant_prunes_children() {
        let boundary = PathBoundary::new("/");
        assert!(boundary.grant_read("/srv/project/src"));
        assert!(boundary.grant_read("/srv/project/docs"));
        assert!(boundary.grant_read("/srv/project"));

        assert_eq!(
            boundary.roots(Access::Read),
            vec![PathBuf::from("/srv/project")]
        );
    }

    #[test]
    fn test_grant_is_idempotent() {
        let boundary = PathBoundary::new("/");
        assert!(boundary.grant_write("/srv/project"));
        assert!(!boundary.grant_write("/srv/project"));
        assert!(!boundary.grant_write("/srv/project/sub"));
        assert_eq!(boundary.roots(Access::Write).len(), 1);
    }

    #[test]
    fn test_traversal_is_normalized_away() {
        let boundary = PathBoundary::new("/srv/project");
        boundary.grant_read("/srv/project");

        assert!(!boundary.is_read_allowed("../secrets/key"));
        assert!(!boundary.is_read_allowed("/srv/project/../secrets"));
        assert!(boundary.is_read_allowed("./src/../README.md"));
    }

    #[test]
    fn test_relative_paths_use_cwd() {
        let dir = TempDir::new().unwrap();
        let boundary = PathBoundary::with_root(dir.path());

        assert!(boundary.is_write_allowed("new/file.txt"));
        assert!(boundary.is_read_allowed(dir.path().join("a.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let boundary = PathBoundary::with_root(root.path());
        assert!(!boundary.is_read_allowed(root.path().join("link/secret.txt")));
    }

    #[test]
    fn test_clear_removes_all() {
        let boundary = PathBoundary::with_root("/srv/project");
        boundary.clear();
        assert!(!boundary.is_read_allowed("/srv/project"));
        assert!(boundary.roots(Access::Write).is_empty());
    }
}
