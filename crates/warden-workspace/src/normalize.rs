//! Path normalization helpers.

use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `cwd` and fold `.`/`..` segments without touching disk.
///
/// `..` at the root stays at the root.
#[must_use]
pub fn normalize_lexical(cwd: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            Component::Normal(p) => out.push(p),
        }
    }
    out
}

/// Resolve symlinks in the longest existing prefix of an absolute path.
///
/// Components that do not exist yet are re-appended verbatim, so a file
/// about to be created resolves to the same place as its parent directory.
#[must_use]
pub fn resolve_existing(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for name in missing.into_iter().rev() {
                resolved.push(name);
            }
            return resolved;
        }
        match (existing.file_name().map(ToOwned::to_owned), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                existing = parent.to_path_buf();
            },
            _ => return path.to_path_buf(),
        }
    }
}

/// Case-fold a path on platforms whose default filesystems ignore case.
#[must_use]
pub fn fold_case(path: PathBuf) -> PathBuf {
    if cfg!(any(target_os = "macos", target_os = "windows")) {
        PathBuf::from(path.to_string_lossy().to_lowercase())
    } else {
        path
    }
}

/// On-disk form: lexical fold and symlink resolution, case preserved.
///
/// Use this for I/O; compare with [`normalize_path`].
#[must_use]
pub fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
    resolve_existing(&normalize_lexical(cwd, path))
}

/// Full comparison form: lexical fold, symlink resolution, case fold.
#[must_use]
pub fn normalize_path(cwd: &Path, path: &Path) -> PathBuf {
    fold_case(resolve_path(cwd, path))
}

/// Component-wise containment: `path == base` or `path` is under `base`.
#[must_use]
pub fn is_within(base: &Path, path: &Path) -> bool {
    path.starts_with(base)
}
