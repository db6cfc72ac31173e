//! Bash tool: runs shell commands, streaming output lines as progress.

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use warden_core::ToolKind;

use crate::contract::{Tool, ToolEvent, ToolOutput, ToolStream, optional_usize, required_str};
use crate::context::{CallContext, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::truncate::truncate_output;

/// Maximum timeout in milliseconds (10 minutes).
const MAX_TIMEOUT_MS: u64 = 600_000;
/// Sentinel used to extract the post-command working directory.
const CWD_SENTINEL: &str = "__WARDEN_CWD__";

/// Built-in tool for executing bash commands.
pub struct BashTool;

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Executes a bash command. The working directory persists between invocations. \
         Output lines stream as they are produced. Optional timeout in milliseconds (max 600000)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (max: 600000)"
                }
            },
            "required": ["command"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Shell
    }

    async fn validate_input(&self, input: &Value, _ctx: &ToolContext) -> ToolResult<()> {
        let command = required_str(input, "command")?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidArguments("command cannot be empty".into()));
        }
        if let Some(timeout) = input.get("timeout")
            && timeout.as_u64().is_none_or(|ms| ms == 0 || ms > MAX_TIMEOUT_MS)
        {
            return Err(ToolError::InvalidArguments(format!(
                "timeout must be between 1 and {MAX_TIMEOUT_MS} milliseconds"
            )));
        }
        Ok(())
    }

    fn call(&self, input: Value, ctx: CallContext) -> ToolStream {
        let (tx, rx) = mpsc::channel::<ToolResult<ToolEvent>>(64);
        let start = async move {
            let command = match required_str(&input, "command") {
                Ok(c) => c.to_string(),
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                },
            };
            let timeout = optional_usize(&input, "timeout")
                .and_then(|ms| u64::try_from(ms).ok())
                .map_or(ctx.env.shell_timeout, Duration::from_millis);
            tokio::spawn(run(command, timeout, ctx, tx));
        };

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        stream::once(start)
            .filter_map(|()| async { None::<ToolResult<ToolEvent>> })
            .chain(events)
            .boxed()
    }

    fn render_tool_use_message(&self, input: &Value) -> String {
        let command = input.get("command").and_then(Value::as_str).unwrap_or("");
        format!("$ {command}")
    }
}

async fn run(
    command: String,
    timeout: Duration,
    ctx: CallContext,
    tx: mpsc::Sender<ToolResult<ToolEvent>>,
) {
    let result = execute(&command, timeout, &ctx, &tx).await;
    if let Err(e) = &result {
        debug!(request_id = %ctx.request_id, error = %e, "bash command did not complete");
    }
    let _ = tx.send(result.map(ToolEvent::Result)).await;
}

async fn execute(
    command: &str,
    timeout: Duration,
    ctx: &CallContext,
    tx: &mpsc::Sender<ToolResult<ToolEvent>>,
) -> ToolResult<ToolOutput> {
    let cwd = ctx.env.cwd.read().await.clone();
    let wrapped = format!(
        "{command}\n__WARDEN_EXIT__=$?\necho \"{CWD_SENTINEL}\"\npwd\nexit $__WARDEN_EXIT__"
    );

    let mut child = Command::new("bash")
        .arg("-c")
        .arg(&wrapped)
        .current_dir(&cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ToolError::ExecutionFailed("stdout not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ToolError::ExecutionFailed("stderr not captured".into()))?;
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut output = String::new();
    let mut errors = String::new();
    let mut new_cwd: Option<PathBuf> = None;
    let mut saw_sentinel = false;
    let (mut out_done, mut err_done) = (false, false);

    while !(out_done && err_done) {
        tokio::select! {
            () = ctx.cancel.cancelled() => return abort(&mut child, ToolError::Cancelled).await,
            () = tx.closed() => return abort(&mut child, ToolError::Cancelled).await,
            () = &mut deadline => {
                let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return abort(&mut child, ToolError::Timeout(ms)).await;
            },
            line = out_lines.next_line(), if !out_done => match line {
                Ok(Some(line)) if line == CWD_SENTINEL => saw_sentinel = true,
                Ok(Some(line)) if saw_sentinel => {
                    if new_cwd.is_none() && !line.is_empty() {
                        new_cwd = Some(PathBuf::from(line.trim()));
                    }
                },
                Ok(Some(line)) => {
                    push_line(&mut output, &line);
                    if tx.send(Ok(ToolEvent::Progress(line))).await.is_err() {
                        return abort(&mut child, ToolError::Cancelled).await;
                    }
                },
                Ok(None) | Err(_) => out_done = true,
            },
            line = err_lines.next_line(), if !err_done => match line {
                Ok(Some(line)) => {
                    push_line(&mut errors, &line);
                    if tx.send(Ok(ToolEvent::Progress(line))).await.is_err() {
                        return abort(&mut child, ToolError::Cancelled).await;
                    }
                },
                Ok(None) | Err(_) => err_done = true,
            },
        }
    }

    let status = tokio::select! {
        () = ctx.cancel.cancelled() => return abort(&mut child, ToolError::Cancelled).await,
        () = tx.closed() => return abort(&mut child, ToolError::Cancelled).await,
        status = child.wait() => status?,
    };
    let exit_code = status.code().unwrap_or(-1);

    if let Some(dir) = new_cwd {
        update_cwd(&ctx.env, dir).await;
    }

    let text = format_result(&output, &errors, exit_code);
    Ok(ToolOutput::new(
        serde_json::json!({
            "stdout": output,
            "stderr": errors,
            "exit_code": exit_code,
        }),
        truncate_output(text, ctx.env.max_output_chars),
    ))
}

async fn abort(child: &mut Child, reason: ToolError) -> ToolResult<ToolOutput> {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill shell child");
    }
    Err(reason)
}

async fn update_cwd(env: &ToolContext, dir: PathBuf) {
    if env.boundary.is_read_allowed(&dir) {
        *env.cwd.write().await = dir;
    } else {
        warn!(dir = %dir.display(), "shell left the granted directories, keeping previous cwd");
    }
}

fn push_line(buf: &mut String, line: &str) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}

fn format_result(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let mut text = stdout.to_string();
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("STDERR:\n");
        text.push_str(stderr);
    }
    if exit_code != 0 {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&format!("(exit code: {exit_code})"));
    }
    if text.is_empty() {
        text.push_str("(no output)");
    }
    text
}
