//! Grep tool: searches file contents with regex.

use regex::Regex;
use serde_json::Value;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;
use warden_core::ToolKind;
use warden_vfs::ReadOptions;
use warden_workspace::Access;

use crate::context::{CallContext, ToolContext};
use crate::contract::{Tool, ToolOutput, ToolStream, once_result, optional_str, optional_usize, required_str};
use crate::error::{ToolError, ToolResult};

/// Maximum number of matching files to report.
const MAX_MATCHING_FILES: usize = 100;
/// Bytes inspected for NUL when sniffing binary files.
const BINARY_SNIFF_LEN: usize = 512;

/// Built-in tool for searching file contents.
pub struct GrepTool;

/// A compiled search request.
struct GrepQuery {
    regex: Regex,
    file_glob: Option<globset::GlobMatcher>,
    context: usize,
}

impl GrepQuery {
    fn parse(input: &Value) -> ToolResult<Self> {
        let pattern = required_str(input, "pattern")?;
        let case_insensitive = input
            .get("case_insensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let regex_pattern = if case_insensitive {
            format!("(?i){pattern}")
        } else {
            pattern.to_string()
        };
        let regex = Regex::new(&regex_pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid regex: {e}")))?;

        let file_glob = optional_str(input, "glob")
            .map(|g| {
                globset::GlobBuilder::new(g)
                    .literal_separator(false)
                    .build()
                    .map(|gb| gb.compile_matcher())
            })
            .transpose()
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid file glob: {e}")))?;

        Ok(Self {
            regex,
            file_glob,
            context: optional_usize(input, "context").unwrap_or(0),
        })
    }

    fn wants(&self, root: &Path, path: &Path, file_name: &str) -> bool {
        self.file_glob.as_ref().is_none_or(|glob| {
            let rel = path.strip_prefix(root).unwrap_or(path);
            glob.is_match(rel) || glob.is_match(file_name)
        })
    }
}

/// Accumulated search results.
#[derive(Debug, Default)]
struct GrepReport {
    output: String,
    match_count: usize,
    file_count: usize,
    truncated: bool,
}

impl GrepReport {
    /// Search one file's contents. Returns whether anything matched.
    fn scan(&mut self, path: &Path, content: &str, context: usize, regex: &Regex) -> bool {
        let lines: Vec<&str> = content.lines().collect();
        let mut matched = false;
        for (idx, line) in lines.iter().enumerate() {
            if regex.is_match(line) {
                matched = true;
                self.match_count = self.match_count.saturating_add(1);
                write_context_lines(&mut self.output, path, &lines, idx, context);
            }
        }
        matched
    }
}

fn search_path(input: &Value, ctx: &ToolContext) -> ToolResult<PathBuf> {
    match optional_str(input, "path") {
        Some(path) => ctx.check_access(Access::Read, path),
        None if ctx.boundary.is_read_allowed(&ctx.workspace_root) => Ok(ctx.workspace_root.clone()),
        None => Err(ToolError::OutsideBoundary {
            access: Access::Read,
            path: ctx.workspace_root.clone(),
        }),
    }
}

#[async_trait::async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Searches file contents using regex. Supports context lines and file type filtering. \
         Returns matching lines in file:line:content format."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search in (defaults to workspace root)"
                },
                "glob": {
                    "type": "string",
                    "description": "Glob to filter files (e.g. \"*.rs\", \"*.{ts,tsx}\")"
                },
                "context": {
                    "type": "integer",
                    "description": "Number of context lines to show before and after matches"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Case insensitive search (default: false)"
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
        GrepQuery::parse(input)?;
        search_path(input, ctx)?;
        Ok(())
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        once_result(async move {
            let query = GrepQuery::parse(&input)?;
            let pattern = required_str(&input, "pattern")?.to_string();
            let root = search_path(&input, &ctx.env)?;

            if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
                return Err(ToolError::PathNotFound(root.display().to_string()));
            }

            let report = if tokio::fs::metadata(&root).await.is_ok_and(|m| m.is_file()) {
                let file = ctx.env.files.read_file(&root, ReadOptions::default()).await?;
                let mut report = GrepReport::default();
                if !file.lossy
                    && !is_binary(file.content.as_bytes())
                    && report.scan(&root, &file.content, query.context, &query.regex)
                {
                    report.file_count = 1;
                }
                report
            } else {
                let cancel = ctx.cancel.clone();
                let max_size = ctx.env.files.policy().max_file_size;
                tokio::task::spawn_blocking(move || search(&root, &query, max_size, &cancel))
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(format!("grep walk panicked: {e}")))??
            };

            let mut text = report.output;
            if report.match_count == 0 {
                text = format!("No matches for \"{pattern}\" found");
            } else if report.truncated {
                let _ = write!(text, "\n(stopped after {MAX_MATCHING_FILES} files with matches)");
            } else {
                let _ = write!(
                    text,
                    "\n({} matches in {} files)",
                    report.match_count, report.file_count
                );
            }

            Ok(ToolOutput::new(
                serde_json::json!({
                    "matches": report.match_count,
                    "files": report.file_count,
                    "truncated": report.truncated,
                }),
                crate::truncate::truncate_output(text, ctx.env.max_output_chars),
            ))
        })
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        let pattern = input.get("pattern").and_then(Value::as_str).unwrap_or("");
        match optional_str(input, "path") {
            Some(path) => format!("Grep \"{pattern}\" in {path}"),
            None => format!("Grep \"{pattern}\""),
        }
    }

    fn render_result(&self, output: &ToolOutput) -> String {
        let matches = output.data.get("matches").and_then(Value::as_u64).unwrap_or(0);
        let files = output.data.get("files").and_then(Value::as_u64).unwrap_or(0);
        format!("{matches} matches in {files} files")
    }
}

fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_SNIFF_LEN).any(|b| *b == 0)
}

/// Walk a directory, skipping hidden entries, binaries and files over `max_size`.
fn search(root: &Path, query: &GrepQuery, max_size: u64, cancel: &CancellationToken) -> ToolResult<GrepReport> {
    let mut report = GrepReport::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name().to_str().is_none_or(|s| !s.starts_with('.')))
    {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        if !query.wants(root, entry.path(), &entry.file_name().to_string_lossy()) {
            continue;
        }

        if !entry.metadata().is_ok_and(|m| m.len() <= max_size) {
            continue;
        }
        let Ok(data) = std::fs::read(entry.path()) else {
            continue;
        };
        if is_binary(&data) {
            continue;
        }
        let Ok(content) = String::from_utf8(data) else {
            continue;
        };

        if report.file_count >= MAX_MATCHING_FILES {
            if query.regex.is_match(&content) {
                report.truncated = true;
                break;
            }
            continue;
        }
        if report.scan(entry.path(), &content, query.context, &query.regex) {
            report.file_count = report.file_count.saturating_add(1);
        }
    }

    Ok(report)
}

/// Write a match with context lines to the output buffer.
///
/// Matches use `path:line:text`, context lines use `path:line-text`.
fn write_context_lines(output: &mut String, path: &Path, lines: &[&str], idx: usize, context: usize) {
    let start = idx.saturating_sub(context);
    let end = idx.saturating_add(context).saturating_add(1).min(lines.len());

    for (line_num, line) in (start.saturating_add(1)..).zip(lines.get(start..end).unwrap_or_default()) {
        let sep = if line_num == idx.saturating_add(1) { ':' } else { '-' };
        let _ = writeln!(output, "{}:{line_num}{sep}{line}", path.display());
    }
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
        run_in(Arc::new(ToolContext::for_workspace(dir.path())), input).await
    }

    async fn run_in(env: Arc<ToolContext>, input: Value) -> ToolResult<ToolOutput> {
        let mut stream = GrepTool.call(input, CallContext::detached(env));
        match stream.next().await.unwrap()? {
            ToolEvent::Result(out) => Ok(out),
            ToolEvent::Progress(p) => panic!("unexpected progress {p}"),
        }
    }

    #[tokio::test]
    async fn test_grep_basic() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {\n    println!(\"hi\");\n}\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn helper() {}\n").unwrap();

        let out = run(&dir, serde_json::json!({"pattern": "fn \\w+"})).await.unwrap();
        assert_eq!(out.data["matches"], 2);
        assert_eq!(out.data["files"], 2);
        assert!(out.for_assistant.contains("a.rs:1:fn main() {"));
        assert_eq!(GrepTool.render_result(&out), "2 matches in 2 files");
    }

    #[tokio::test]
    async fn test_grep_context_and_case() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "one\nTWO\nthree\n").unwrap();

        let out = run(
            &dir,
            serde_json::json!({"pattern": "two", "case_insensitive": true, "context": 1}),
        )
        .await
        .unwrap();
        assert!(out.for_assistant.contains("notes.txt:1-one"));
        assert!(out.for_assistant.contains("notes.txt:2:TWO"));
        assert!(out.for_assistant.contains("notes.txt:3-three"));
    }

    #[tokio::test]
    async fn test_grep_glob_filter_and_binary_skip() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("a.md"), "needle\n").unwrap();
        std::fs::write(dir.path().join("blob.rs"), b"needle\0\x01\x02").unwrap();

        let out = run(&dir, serde_json::json!({"pattern": "needle", "glob": "*.rs"}))
            .await
            .unwrap();
        assert_eq!(out.data["files"], 1);
        assert!(out.for_assistant.contains("a.rs:1:needle"));
        assert!(!out.for_assistant.contains("a.md"));
    }

    #[tokio::test]
    async fn test_grep_single_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha\nbeta\n").unwrap();

        let out = run(&dir, serde_json::json!({"pattern": "beta", "path": "a.txt"}))
            .await
            .unwrap();
        assert_eq!(out.data["matches"], 1);
        assert_eq!(out.data["files"], 1);
    }

    #[tokio::test]
    async fn test_grep_single_file_honors_size_cap() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), "needle in a large file\n").unwrap();
        let env = Arc::new(ToolContext::for_workspace(dir.path()));
        env.files.set_max_file_size(4);

        let err = run_in(
            Arc::clone(&env),
            serde_json::json!({"pattern": "needle", "path": "big.txt"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);
    }

    #[tokio::test]
    async fn test_grep_walk_skips_oversized_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), "needle in a large file\n").unwrap();
        std::fs::write(dir.path().join("small.txt"), "needle\n").unwrap();
        let env = Arc::new(ToolContext::for_workspace(dir.path()));
        env.files.set_max_file_size(10);

        let out = run_in(env, serde_json::json!({"pattern": "needle"})).await.unwrap();
        assert_eq!(out.data["files"], 1);
        assert!(out.for_assistant.contains("small.txt"));
        assert!(!out.for_assistant.contains("big.txt"));
    }

    #[tokio::test]
    async fn test_grep_no_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        let out = run(&dir, serde_json::json!({"pattern": "absent"})).await.unwrap();
        assert!(out.for_assistant.contains("No matches"));
    }

    #[tokio::test]
    async fn test_grep_caps_matching_files() {
        let dir = TempDir::new().unwrap();
        for i in 0..105 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), "needle\n").unwrap();
        }
        let out = run(&dir, serde_json::json!({"pattern": "needle"})).await.unwrap();
        assert_eq!(out.data["files"], 100);
        assert_eq!(out.data["truncated"], true);
        assert!(out.for_assistant.contains("stopped after 100 files"));
    }

    #[tokio::test]
    async fn test_grep_invalid_regex() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::for_workspace(dir.path());
        let err = GrepTool
            .validate_input(&serde_json::json!({"pattern": "("}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
}
