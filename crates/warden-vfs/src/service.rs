//! The sandboxed file service.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use warden_workspace::{fold_case, is_within, normalize_path, resolve_path};

use crate::error::{SandboxCode, VfsError, VfsResult};
use crate::policy::SandboxPolicy;
use crate::validate::{check_path_syntax, validate_file_name};

static GLOBAL: OnceLock<Arc<SecureFileService>> = OnceLock::new();

/// Stat result for a validated path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Size in bytes.
    pub size: u64,
    /// True for regular files.
    pub is_file: bool,
    /// True for directories.
    pub is_directory: bool,
    /// Modification time in seconds since the UNIX epoch.
    pub mtime: u64,
}

impl From<&std::fs::Metadata> for FileMetadata {
    fn from(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());
        Self {
            size: meta.len(),
            is_file: meta.is_file(),
            is_directory: meta.is_dir(),
            mtime,
        }
    }
}

/// Content returned by [`SecureFileService::read_file`].
#[derive(Debug, Clone)]
pub struct FileContent {
    /// UTF-8 text (invalid sequences replaced).
    pub content: String,
    /// Whether the bytes were not valid UTF-8, so `content` is not a
    /// faithful copy. Never write such content back.
    pub lossy: bool,
    /// Metadata taken before the read.
    pub metadata: FileMetadata,
}

/// Options for [`SecureFileService::read_file`].
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Enforce the extension allow-list.
    pub check_file_extension: bool,
    /// Override the policy's read cap for this call.
    pub max_size: Option<u64>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            check_file_extension: true,
            max_size: None,
        }
    }
}

/// Options for [`SecureFileService::write_file`].
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Enforce the extension allow-list.
    pub check_file_extension: bool,
    /// Create missing parent directories.
    pub create_directory: bool,
    /// Write a temporary sibling and rename it into place.
    pub atomic: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            check_file_extension: true,
            create_directory: false,
            atomic: true,
        }
    }
}

/// A fully written temporary sibling waiting to be renamed over its target.
///
/// Dropping it without calling [`StagedWrite::commit`] removes the temporary
/// file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: tempfile::NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    fn create(target: PathBuf, content: &[u8]) -> VfsResult<Self> {
        let parent = target
            .parent()
            .ok_or_else(|| VfsError::rejected(SandboxCode::InvalidFileName, "Path has no parent"))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".warden-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        if let Ok(existing) = std::fs::metadata(&target) {
            std::fs::set_permissions(temp.path(), existing.permissions())?;
        }
        Ok(Self { temp, target })
    }

    /// Path of the temporary sibling.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Path the content will land at.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temporary file over the target.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the rename fails; the temporary file is removed.
    pub fn commit(self) -> VfsResult<PathBuf> {
        let target = self.target;
        self.temp.persist(&target).map_err(|e| VfsError::Io(e.error))?;
        Ok(target)
    }
}

/// Validating file service over one process-wide sandbox policy.
///
/// Every operation runs the same gate before touching disk: path syntax,
/// base-directory containment, then (where relevant) file name, extension
/// and size checks. Policy mutations are visible immediately to every holder
/// of the service.
#[derive(Debug)]
pub struct SecureFileService {
    cwd: PathBuf,
    policy: RwLock<SandboxPolicy>,
}

impl SecureFileService {
    /// Create a service resolving relative paths against the process cwd.
    #[must_use]
    pub fn new(policy: SandboxPolicy) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|e| {
            warn!(error = %e, "current directory unavailable, resolving relative paths from /");
            PathBuf::from("/")
        });
        Self::with_cwd(cwd, policy)
    }

    /// Create a service resolving relative paths against `cwd`.
    #[must_use]
    pub fn with_cwd(cwd: impl Into<PathBuf>, policy: SandboxPolicy) -> Self {
        Self {
            cwd: cwd.into(),
            policy: RwLock::new(policy),
        }
    }

    /// The process-wide instance, created on first use.
    ///
    /// Rooted at the process cwd. If the cwd cannot be read, the instance
    /// starts with no base paths and rejects everything until one is added.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let service = match std::env::current_dir() {
                Ok(cwd) => Self::with_cwd(cwd.clone(), SandboxPolicy::rooted(cwd)),
                Err(e) => {
                    warn!(error = %e, "current directory unavailable, file service starts closed");
                    Self::with_cwd("/", SandboxPolicy::default())
                },
            };
            Arc::new(service)
        }))
    }

    /// Snapshot of the current policy.
    #[must_use]
    pub fn policy(&self) -> SandboxPolicy {
        self.read_policy().clone()
    }

    /// Replace the policy wholesale.
    pub fn set_policy(&self, policy: SandboxPolicy) {
        *self.write_policy() = policy;
    }

    /// Allow file operations under `path`.
    pub fn add_allowed_base_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        info!(path = %path.display(), "file service base path added");
        let mut policy = self.write_policy();
        if !policy.base_paths.contains(&path) {
            policy.base_paths.push(path);
        }
    }

    /// Set the read size cap.
    pub fn set_max_file_size(&self, bytes: u64) {
        self.write_policy().max_file_size = bytes;
    }

    /// Set the write size cap.
    pub fn set_max_write_size(&self, bytes: u64) {
        self.write_policy().max_write_size = bytes;
    }

    /// Extend the extension allow-list.
    pub fn add_allowed_extensions<I, S>(&self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = self.write_policy();
        for ext in extensions {
            policy.allow_extension(ext.as_ref());
        }
    }

    /// Validate `path` and return its normalized absolute form.
    ///
    /// # Errors
    ///
    /// Returns `too_long`, `traversal`, `suspicious_pattern` or
    /// `outside_allowed_directories`.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> VfsResult<PathBuf> {
        let path = path.as_ref();
        let policy = self.read_policy();

        check_path_syntax(path, policy.max_path_length).inspect_err(|e| {
            debug!(path = %path.display(), code = %e.code(), "path rejected");
        })?;

        // Containment is decided on the case-folded form; I/O uses the
        // resolved path with its original case.
        let resolved = resolve_path(&self.cwd, path);
        let folded = fold_case(resolved.clone());
        let contained = policy
            .base_paths
            .iter()
            .map(|base| normalize_path(&self.cwd, base))
            .any(|base| is_within(&base, &folded));
        if !contained {
            debug!(path = %path.display(), "path outside allowed directories");
            return Err(VfsError::rejected(
                SandboxCode::OutsideAllowedDirectories,
                format!("Path is outside allowed directories: {}", path.display()),
            ));
        }
        Ok(resolved)
    }

    /// Validate a bare file name.
    ///
    /// # Errors
    ///
    /// Returns `invalid_file_name`.
    pub fn validate_file_name(name: &str) -> VfsResult<()> {
        validate_file_name(name)
    }

    /// Whether a validated path exists.
    ///
    /// # Errors
    ///
    /// Returns a path validation error.
    pub async fn exists(&self, path: impl AsRef<Path>) -> VfsResult<bool> {
        let target = self.validate_path(path)?;
        Ok(tokio::fs::try_exists(&target).await.unwrap_or(false))
    }

    /// Read a text file.
    ///
    /// # Errors
    ///
    /// Returns a path validation error, `does_not_exist`, `not_a_file`,
    /// `extension_not_allowed` or `too_large`.
    pub async fn read_file(&self, path: impl AsRef<Path>, opts: ReadOptions) -> VfsResult<FileContent> {
        let path = path.as_ref();
        let target = self.validate_path(path)?;
        let meta = stat(&target)
            .await?
            .ok_or_else(|| does_not_exist(path))?;
        if !meta.is_file() {
            return Err(VfsError::rejected(
                SandboxCode::NotAFile,
                format!("Path is not a file: {}", path.display()),
            ));
        }
        if opts.check_file_extension {
            self.check_extension(&target)?;
        }

        let cap = opts.max_size.unwrap_or_else(|| self.read_policy().max_file_size);
        if meta.len() > cap {
            return Err(too_large(meta.len(), cap));
        }

        let bytes = tokio::fs::read(&target).await?;
        let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if len > cap {
            return Err(too_large(len, cap));
        }
        debug!(path = %target.display(), size = len, "file read");
        let (content, lossy) = match String::from_utf8(bytes) {
            Ok(text) => (text, false),
            Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
        };
        Ok(FileContent {
            content,
            lossy,
            metadata: FileMetadata::from(&meta),
        })
    }

    /// Write a file, atomically unless `opts.atomic` is false.
    ///
    /// # Errors
    ///
    /// Returns a path or file name validation error, `extension_not_allowed`,
    /// `too_large`, `does_not_exist` for a missing parent without
    /// `create_directory`, `not_a_file` if a directory occupies the target,
    /// or an I/O error.
    pub async fn write_file(
        &self,
        path: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
        opts: WriteOptions,
    ) -> VfsResult<FileMetadata> {
        let content = content.as_ref();
        let target = self.prepare_write(path.as_ref(), content.len(), opts).await?;

        if opts.atomic {
            let staged = stage_blocking(target.clone(), content.to_vec()).await?;
            staged.commit()?;
        } else {
            tokio::fs::write(&target, content).await?;
        }

        let meta = tokio::fs::metadata(&target).await?;
        info!(path = %target.display(), size = meta.len(), atomic = opts.atomic, "file written");
        Ok(FileMetadata::from(&meta))
    }

    /// Run every write check and write the content to a temporary sibling.
    ///
    /// Nothing is visible at the target until [`StagedWrite::commit`].
    ///
    /// # Errors
    ///
    /// Same as [`SecureFileService::write_file`].
    pub async fn stage_write(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        opts: WriteOptions,
    ) -> VfsResult<StagedWrite> {
        let content = content.into();
        let target = self.prepare_write(path.as_ref(), content.len(), opts).await?;
        stage_blocking(target, content).await
    }

    /// Delete a regular file.
    ///
    /// # Errors
    ///
    /// Returns a path validation error, `does_not_exist`, `not_a_file` or an
    /// I/O error.
    pub async fn delete_file(&self, path: impl AsRef<Path>) -> VfsResult<()> {
        let path = path.as_ref();
        let target = self.validate_path(path)?;
        let meta = stat(&target)
            .await?
            .ok_or_else(|| does_not_exist(path))?;
        if meta.is_dir() {
            return Err(VfsError::rejected(
                SandboxCode::NotAFile,
                format!("Cannot delete a directory: {}", path.display()),
            ));
        }
        tokio::fs::remove_file(&target).await?;
        info!(path = %target.display(), "file deleted");
        Ok(())
    }

    /// Create a directory and its missing parents. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a path validation error, `path_exists_not_directory` or an
    /// I/O error.
    pub async fn create_directory(&self, path: impl AsRef<Path>) -> VfsResult<()> {
        let path = path.as_ref();
        let target = self.validate_path(path)?;
        match stat(&target).await? {
            Some(meta) if meta.is_dir() => Ok(()),
            Some(_) => Err(VfsError::rejected(
                SandboxCode::PathExistsNotDirectory,
                format!("Path exists and is not a directory: {}", path.display()),
            )),
            None => {
                tokio::fs::create_dir_all(&target).await?;
                debug!(path = %target.display(), "directory created");
                Ok(())
            },
        }
    }

    /// Stat a validated path.
    ///
    /// # Errors
    ///
    /// Returns a path validation error or `does_not_exist`.
    pub async fn get_file_info(&self, path: impl AsRef<Path>) -> VfsResult<FileMetadata> {
        let path = path.as_ref();
        let target = self.validate_path(path)?;
        let meta = stat(&target)
            .await?
            .ok_or_else(|| does_not_exist(path))?;
        Ok(FileMetadata::from(&meta))
    }

    async fn prepare_write(&self, path: &Path, len: usize, opts: WriteOptions) -> VfsResult<PathBuf> {
        let target = self.validate_path(path)?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        validate_file_name(&name)?;

        if opts.check_file_extension {
            self.check_extension(&target)?;
        }

        let cap = self.read_policy().max_write_size;
        let len = u64::try_from(len).unwrap_or(u64::MAX);
        if len > cap {
            debug!(path = %path.display(), size = len, cap, "write rejected as too large");
            return Err(too_large(len, cap));
        }

        if let Some(meta) = stat(&target).await?
            && meta.is_dir()
        {
            return Err(VfsError::rejected(
                SandboxCode::NotAFile,
                format!("Path is a directory: {}", path.display()),
            ));
        }

        if let Some(parent) = target.parent() {
            match stat(parent).await? {
                Some(meta) if meta.is_dir() => {},
                Some(_) => {
                    return Err(VfsError::rejected(
                        SandboxCode::PathExistsNotDirectory,
                        "Parent path exists and is not a directory",
                    ));
                },
                None if opts.create_directory => tokio::fs::create_dir_all(parent).await?,
                None => {
                    return Err(VfsError::rejected(
                        SandboxCode::DoesNotExist,
                        "Parent directory does not exist",
                    ));
                },
            }
        }

        Ok(target)
    }

    fn check_extension(&self, target: &Path) -> VfsResult<()> {
        let ext = target.extension().map(|e| e.to_string_lossy().into_owned());
        if self.read_policy().is_extension_allowed(ext.as_deref()) {
            return Ok(());
        }
        let message = match ext {
            Some(ext) => format!("File extension '.{ext}' is not allowed"),
            None => "Files without an extension are not allowed".to_string(),
        };
        Err(VfsError::rejected(SandboxCode::ExtensionNotAllowed, message))
    }

    fn read_policy(&self) -> RwLockReadGuard<'_, SandboxPolicy> {
        self.policy.read().unwrap_or_else(|e| {
            warn!("SecureFileService policy lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }

    fn write_policy(&self) -> RwLockWriteGuard<'_, SandboxPolicy> {
        self.policy.write().unwrap_or_else(|e| {
            warn!("SecureFileService policy lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }
}

async fn stat(path: &Path) -> VfsResult<Option<std::fs::Metadata>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn stage_blocking(target: PathBuf, content: Vec<u8>) -> VfsResult<StagedWrite> {
    tokio::task::spawn_blocking(move || StagedWrite::create(target, &content))
        .await
        .map_err(|e| VfsError::Io(std::io::Error::other(e)))?
}

fn does_not_exist(path: &Path) -> VfsError {
    VfsError::rejected(
        SandboxCode::DoesNotExist,
        format!("File does not exist: {}", path.display()),
    )
}

fn too_large(size: u64, cap: u64) -> VfsError {
    VfsError::rejected(
        SandboxCode::TooLarge,
        format!("File size ({size} bytes) exceeds the limit of {cap} bytes"),
    )
}
