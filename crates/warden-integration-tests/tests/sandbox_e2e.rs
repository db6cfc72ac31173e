//! End-to-end file sandbox scenarios through the session dispatcher.

mod common;

use common::SessionHarness;
use serde_json::json;
use warden_approval::PermissionMode;
use warden_core::ErrorKind;
use warden_runtime::DispatchOutcome;
use warden_vfs::{SandboxCode, WriteOptions};

fn cause(outcome: &DispatchOutcome) -> Option<&str> {
    outcome.rejection().and_then(|r| r.cause.as_deref())
}

#[tokio::test]
async fn test_write_inside_workspace_succeeds() {
    let h = SessionHarness::new(PermissionMode::Default).await;
    let target = h.workspace.path("out.txt");

    let outcome = h
        .invoke(
            "write_file",
            json!({"file_path": target.to_str().unwrap(), "content": "hi"}),
        )
        .await;

    assert!(outcome.is_success(), "{}", outcome.rendered);
    assert_eq!(h.workspace.read("out.txt"), "hi");
    assert_eq!(h.approvals.calls(), 1);
}

#[tokio::test]
async fn test_write_outside_workspace_is_sandbox_violation() {
    let h = SessionHarness::new(PermissionMode::BypassPermissions).await;
    let before = std::fs::read("/etc/passwd").ok();

    let outcome = h
        .invoke("write_file", json!({"file_path": "/etc/passwd", "content": "x"}))
        .await;

    assert_eq!(outcome.kind(), Some(ErrorKind::SandboxViolation));
    assert_eq!(cause(&outcome), Some("outside_allowed_directories"));
    assert_eq!(std::fs::read("/etc/passwd").ok(), before);
}

#[tokio::test]
async fn test_file_service_rejects_outside_paths_directly() {
    let h = SessionHarness::new(PermissionMode::Default).await;

    let err = h
        .session
        .files()
        .write_file("/etc/passwd", "x", WriteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), SandboxCode::OutsideAllowedDirectories);
    assert_eq!(err.kind(), ErrorKind::SandboxViolation);
}

#[tokio::test]
async fn test_oversized_write_leaves_no_file() {
    let h = SessionHarness::with_config(PermissionMode::BypassPermissions, |cfg| {
        cfg.sandbox.max_write_size = 4;
    })
    .await;
    let target = h.workspace.path("big.txt");

    let outcome = h
        .invoke(
            "write_file",
            json!({"file_path": target.to_str().unwrap(), "content": "hello world"}),
        )
        .await;

    assert_eq!(outcome.kind(), Some(ErrorKind::SandboxViolation));
    assert_eq!(cause(&outcome), Some("too_large"));
    assert!(!h.workspace.exists("big.txt"));
}

#[tokio::test]
async fn test_disallowed_extension_rejected() {
    let h = SessionHarness::new(PermissionMode::BypassPermissions).await;
    let target = h.workspace.path("payload.exe");

    let outcome = h
        .invoke(
            "write_file",
            json!({"file_path": target.to_str().unwrap(), "content": "MZ"}),
        )
        .await;

    assert_eq!(outcome.kind(), Some(ErrorKind::SandboxViolation));
    assert_eq!(cause(&outcome), Some("extension_not_allowed"));
    assert!(!h.workspace.exists("payload.exe"));
}

#[tokio::test]
async fn test_read_back_through_read_file() {
    let h = SessionHarness::new(PermissionMode::Plan).await;
    let file = h.workspace.write("notes.md", "alpha\nbeta\n");

    let outcome = h
        .invoke("read_file", json!({"file_path": file.to_str().unwrap()}))
        .await;

    assert!(outcome.is_success(), "{}", outcome.rendered);
    assert!(outcome.rendered.contains("beta"));
    assert_eq!(h.approvals.calls(), 0);
}
