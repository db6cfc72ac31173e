//! Glob tool: finds files matching a glob pattern.

use serde_json::Value;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;
use warden_core::ToolKind;
use warden_workspace::Access;

use crate::context::{CallContext, ToolContext};
use crate::contract::{Tool, ToolOutput, ToolStream, once_result, optional_str, required_str};
use crate::error::{ToolError, ToolResult};

/// Built-in tool for finding files by glob pattern.
pub struct GlobTool;

impl GlobTool {
    fn search_dir(input: &Value, ctx: &ToolContext) -> ToolResult<PathBuf> {
        match optional_str(input, "path") {
            Some(path) => ctx.check_access(Access::Read, path),
            None if ctx.boundary.is_read_allowed(&ctx.workspace_root) => {
                Ok(ctx.workspace_root.clone())
            },
            None => Err(ToolError::OutsideBoundary {
                access: Access::Read,
                path: ctx.workspace_root.clone(),
            }),
        }
    }

    fn matcher(pattern: &str) -> ToolResult<globset::GlobMatcher> {
        Ok(globset::GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid glob pattern: {e}")))?
            .compile_matcher())
    }
}

#[async_trait::async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Finds files matching a glob pattern (e.g. \"**/*.rs\", \"src/**/*.ts\"). \
         Returns matching file paths sorted by modification time (most recent first)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match files against"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (defaults to workspace root)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn is_concurrency_safe(&self) -> bool {
        true
    }

    async fn validate_input(&self, input: &Value, ctx: &ToolContext) -> ToolResult<()> {
        Self::matcher(required_str(input, "pattern")?)?;
        Self::search_dir(input, ctx)?;
        Ok(())
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        once_result(async move {
            let pattern = required_str(&input, "pattern")?.to_string();
            let matcher = Self::matcher(&pattern)?;
            let search_dir = Self::search_dir(&input, &ctx.env)?;

            if !tokio::fs::try_exists(&search_dir).await.unwrap_or(false) {
                return Err(ToolError::PathNotFound(search_dir.display().to_string()));
            }

            let cancel = ctx.cancel.clone();
            let matches = tokio::task::spawn_blocking(move || {
                collect_matches(&search_dir, &matcher, &cancel)
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("glob walk panicked: {e}")))??;

            let files: Vec<String> = matches.iter().map(|p| p.display().to_string()).collect();
            let text = if files.is_empty() {
                format!("No files matching \"{pattern}\" found")
            } else {
                let mut output = files.join("\n");
                let _ = write!(output, "\n\n({} files matched)", files.len());
                output
            };

            Ok(ToolOutput::new(
                serde_json::json!({ "files": files, "count": matches.len() }),
                text,
            ))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        let pattern = input.get("pattern").and_then(Value::as_str).unwrap_or("");
        match optional_str(input, "path") {
            Some(path) => format!("Glob \"{pattern}\" in {path}"),
            None => format!("Glob \"{pattern}\""),
        }
    }

    fn render_result(&self, output: &ToolOutput) -> String {
        let count = output.data.get("count").and_then(Value::as_u64).unwrap_or(0);
        format!("Found {count} files")
    }
}

/// Walk `root` (skipping hidden entries) and return matching files, newest first.
fn collect_matches(
    root: &Path,
    matcher: &globset::GlobMatcher,
    cancel: &CancellationToken,
) -> ToolResult<Vec<PathBuf>> {
    let mut matches: Vec<(PathBuf, SystemTime)> = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name().to_str().is_none_or(|s| !s.starts_with('.')))
    {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_dir() {
            continue;
        }

        let rel_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if matcher.is_match(rel_path) {
            let mtime = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            matches.push((entry.into_path(), mtime));
        }
    }

    matches.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(matches.into_iter().map(|(path, _)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;
    use tempfile::TempDir;
    use warden_core::ErrorKind;

    use crate::contract::ToolEvent;

    async fn run(dir: &TempDir, input: Value) -> ToolResult<ToolOutput> {
        let env = Arc::new(ToolContext::for_workspace(dir.path()));
        let mut stream = GlobTool.call(input, CallContext::detached(env));
        match stream.next().await.unwrap()? {
            ToolEvent::Result(out) => Ok(out),
            ToolEvent::Progress(p) => panic!("unexpected progress {p}"),
        }
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/mod.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        std::fs::write(dir.path().join(".git/config.rs"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_glob_matches_recursively() {
        let dir = fixture();
        let out = run(&dir, serde_json::json!({"pattern": "**/*.rs"})).await.unwrap();
        assert_eq!(out.data["count"], 2);
        assert!(out.for_assistant.contains("lib.rs"));
        assert!(out.for_assistant.contains("mod.rs"));
        assert!(!out.for_assistant.contains(".git"));
        assert_eq!(GlobTool.render_result(&out), "Found 2 files");
    }

    #[tokio::test]
    async fn test_glob_no_matches() {
        let dir = fixture();
        let out = run(&dir, serde_json::json!({"pattern": "*.py"})).await.unwrap();
        assert!(out.for_assistant.contains("No files matching"));
    }

    #[tokio::test]
    async fn test_glob_invalid_pattern() {
        let dir = fixture();
        let ctx = ToolContext::for_workspace(dir.path());
        let err = GlobTool
            .validate_input(&serde_json::json!({"pattern": "a[b"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_glob_outside_boundary() {
        let dir = fixture();
        let ctx = ToolContext::for_workspace(dir.path());
        let err = GlobTool
            .validate_input(&serde_json::json!({"pattern": "*", "path": "/etc"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);
    }

    #[test]
    fn test_collect_stops_on_cancel() {
        let dir = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let matcher = GlobTool::matcher("**/*").unwrap();
        let err = collect_matches(dir.path(), &matcher, &cancel).unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
    }
}
