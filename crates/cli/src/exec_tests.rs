// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use cs_core::{Endpoint, LineEnding, OsFamily};

use crate::harness::LoopbackPeer;
use crate::session::SessionConfig;

async fn session_with(peer: &LoopbackPeer) -> Session {
    peer.connect(Endpoint::new("local", OsFamily::Linux), SessionConfig::default())
        .await
        .unwrap()
}

#[test]
fn invocation_builds_exec_request() {
    let invocation = Invocation::new("cmd")
        .arg("/c")
        .args(["dir", "/b"])
        .cwd("C:\\work")
        .timeout(Duration::from_millis(1500));
    assert_eq!(
        invocation.to_request(),
        RequestOp::Exec {
            program: "cmd".to_string(),
            args: vec!["/c".to_string(), "dir".to_string(), "/b".to_string()],
            cwd: Some("C:\\work".to_string()),
            timeout_ms: Some(1500),
        }
    );
}

#[test]
fn result_accessors() {
    let result = CommandResult {
        status: CommandStatus::Completed { exit_code: Some(0) },
        stdout: b"out".to_vec(),
        stderr: b"err".to_vec(),
    };
    assert!(result.success());
    assert_eq!(result.stdout_text(), "out");
    assert_eq!(result.stderr_text(), "err");

    let cancelled = CommandResult {
        status: CommandStatus::Cancelled,
        ..result
    };
    assert_eq!(cancelled.exit_code(), None);
    assert!(!cancelled.success());
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[tokio::test]
    async fn echo_collects_stdout() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let result = run_to_completion(&mut session, &Invocation::new("echo").arg("hello"))
            .await
            .unwrap();
        assert_eq!(result.status, CommandStatus::Completed { exit_code: Some(0) });
        assert_eq!(result.stdout_text(), "hello\n");
        assert!(result.stderr.is_empty());
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn streams_are_kept_apart() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let invocation = Invocation::new("sh").args(["-c", "echo out; echo err >&2"]);
        let result = run_to_completion(&mut session, &invocation).await.unwrap();
        assert_eq!(result.stdout_text(), "out\n");
        assert_eq!(result.stderr_text(), "err\n");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let invocation = Invocation::new("sh").args(["-c", "exit 3"]);
        let result = run_to_completion(&mut session, &invocation).await.unwrap();
        assert_eq!(result.exit_code(), Some(3));
        assert!(!result.success());
        // The session stays usable for the next command.
        let again = run_to_completion(&mut session, &Invocation::new("true")).await.unwrap();
        assert!(again.success());
    }

    #[tokio::test]
    async fn runs_in_peer_root_by_default() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let result = run_to_completion(&mut session, &Invocation::new("pwd")).await.unwrap();
        let root = peer.root().unwrap().display().to_string();
        assert_eq!(result.stdout_text().trim_end(), root);
    }

    #[tokio::test]
    async fn windows_output_is_normalized_to_lf() {
        let peer = LoopbackPeer::with_os(OsFamily::Windows).unwrap();
        assert_eq!(peer.endpoint().capabilities.line_ending, LineEnding::Crlf);
        let mut session = session_with(&peer).await;
        let invocation = Invocation::new("printf").arg("hello\\r\\nworld\\r\\n");
        let result = run_to_completion(&mut session, &invocation).await.unwrap();
        assert_eq!(result.stdout_text(), "hello\nworld\n");
    }

    #[tokio::test]
    async fn chunks_arrive_before_exit() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let invocation = Invocation::new("sh").args(["-c", "echo first; sleep 0.2; echo second"]);
        let mut running = execute(&mut session, &invocation).await.unwrap();
        assert!(running.id() > 0);

        let first = running.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.stream, OutputStream::Stdout);
        assert_eq!(first.data, b"first\n");
        let result = running.finish().await.unwrap();
        assert_eq!(result.stdout_text(), "second\n");
        assert!(result.success());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let err = run_to_completion(&mut session, &Invocation::new("crossync-no-such-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }), "{}", err);
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn slow_program_times_out() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let invocation = Invocation::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100));
        let err = run_to_completion(&mut session, &invocation).await.unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut { .. }), "{}", err);
    }

    #[tokio::test]
    async fn cwd_outside_peer_root_is_refused() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let invocation = Invocation::new("pwd").cwd("/");
        let err = run_to_completion(&mut session, &invocation).await.unwrap_err();
        match err {
            ExecutionError::Refused { error, .. } => {
                assert_eq!(error.kind, RemoteErrorKind::InvalidRequest)
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[tokio::test]
    async fn cancel_stops_a_running_command() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let running = execute(&mut session, &Invocation::new("sleep").arg("30"))
            .await
            .unwrap();
        let result = running.cancel(DEFAULT_CANCEL_GRACE).await.unwrap();
        assert_eq!(result.status, CommandStatus::Cancelled);
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn cancel_after_exit_reports_real_status() {
        let peer = LoopbackPeer::new().unwrap();
        let mut session = session_with(&peer).await;
        let invocation = Invocation::new("sh").args(["-c", "echo done; exit 4"]);
        let running = execute(&mut session, &invocation).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let result = running.cancel(DEFAULT_CANCEL_GRACE).await.unwrap();
        assert_eq!(result.status, CommandStatus::Completed { exit_code: Some(4) });
        assert_eq!(result.stdout_text(), "done\n");
        assert!(session.is_ready());
    }
}
