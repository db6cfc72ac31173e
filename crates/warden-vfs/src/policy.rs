//! Sandbox policy: base directories, extension allow-list, size caps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Default read cap (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10_485_760;
/// Default write cap (5 MiB).
pub const DEFAULT_MAX_WRITE_SIZE: u64 = 5_242_880;
/// Default ceiling on the length of a path string.
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4096;
/// Ceiling on a single file name, in bytes.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Common text and source extensions allowed out of the box.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "json", "jsonl", "yaml", "yml", "toml", "ini", "cfg", "conf",
    "env", "xml", "csv", "tsv", "log", "html", "htm", "css", "scss", "less", "js", "jsx", "mjs",
    "cjs", "ts", "tsx", "rs", "py", "pyi", "rb", "go", "java", "kt", "kts", "scala", "swift",
    "c", "h", "cc", "cpp", "cxx", "hpp", "hh", "cs", "php", "pl", "lua", "sh", "bash", "zsh",
    "fish", "ps1", "sql", "graphql", "proto", "vue", "svelte", "dart", "ex", "exs", "erl", "hs",
    "ml", "clj", "lock",
];

/// Mutable sandbox configuration shared by every holder of a file service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    /// Directories file operations may touch (inclusive, recursive).
    pub base_paths: Vec<PathBuf>,
    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: BTreeSet<String>,
    /// Whether files with no extension (`Makefile`, `LICENSE`) pass the extension gate.
    pub allow_extensionless: bool,
    /// Largest file `read_file` will load.
    pub max_file_size: u64,
    /// Largest payload `write_file` will accept.
    pub max_write_size: u64,
    /// Longest accepted path string.
    pub max_path_length: usize,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            base_paths: Vec::new(),
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            allow_extensionless: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_write_size: DEFAULT_MAX_WRITE_SIZE,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }
}

impl SandboxPolicy {
    /// Default policy rooted at a single base directory.
    #[must_use]
    pub fn rooted(base: impl Into<PathBuf>) -> Self {
        Self {
            base_paths: vec![base.into()],
            ..Self::default()
        }
    }

    /// Add an extension to the allow-list. Leading dots and case are ignored.
    pub fn allow_extension(&mut self, ext: &str) {
        let ext = normalize_extension(ext);
        if !ext.is_empty() {
            self.allowed_extensions.insert(ext);
        }
    }

    /// Whether `ext` (as returned by [`std::path::Path::extension`]) is allowed.
    #[must_use]
    pub fn is_extension_allowed(&self, ext: Option<&str>) -> bool {
        match ext {
            None => self.allow_extensionless,
            Some(ext) => self.allowed_extensions.contains(&normalize_extension(ext)),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_conservative() {
        let policy = SandboxPolicy::default();
        assert!(policy.base_paths.is_empty());
        assert!(policy.is_extension_allowed(Some("rs")));
        assert!(!policy.is_extension_allowed(Some("exe")));
        assert!(!policy.is_extension_allowed(Some("so")));
        assert!(policy.max_write_size <= policy.max_file_size);
    }

    #[test]
    fn test_allow_extension_normalizes() {
        let mut policy = SandboxPolicy::default();
        policy.allow_extension(".WASM");
        assert!(policy.is_extension_allowed(Some("wasm")));
        assert!(policy.is_extension_allowed(Some("WASM")));
        policy.allow_extension(".");
        assert!(!policy.allowed_extensions.contains(""));
    }

    #[test]
    fn test_extensionless_toggle() {
        let mut policy = SandboxPolicy::default();
        assert!(policy.is_extension_allowed(None));
        policy.allow_extensionless = false;
        assert!(!policy.is_extension_allowed(None));
    }
}
