// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

//! Tests for the public `run()` function, routed through in-process peers
//! so no network is needed.

use std::fs;
use std::num::NonZeroUsize;

use tempfile::TempDir;

use crate::engine::{DeletePolicy, SyncError};
use crate::{Command, ConnectArgs, ExecArgs, Outcome, OutputFormat, PingArgs, SyncArgs};

fn loopback() -> ConnectArgs {
    ConnectArgs {
        loopback: true,
        ..ConnectArgs::default()
    }
}

fn sync_args(src: String, dest: String) -> SyncArgs {
    SyncArgs {
        src: Some(src),
        dest: Some(dest),
        filter: Vec::new(),
        dry_run: false,
        no_delete: false,
        symlinks: None,
        overwrite_conflicts: false,
        dest_entry_needs_deleting: None,
        dest_root_needs_deleting: None,
        all_destructive_behaviour: None,
        no_state: true,
        jobs: NonZeroUsize::MIN,
        timeout: None,
        stats: false,
        no_progress: true,
        output: OutputFormat::Text,
        connect: loopback(),
    }
}

#[test]
fn test_outcome_exit_codes() {
    assert_eq!(Outcome::Success.exit_code(), 0);
    assert_eq!(Outcome::Partial.exit_code(), 2);
    assert_eq!(Outcome::Code(7).exit_code(), 7);
}

#[test]
fn test_completions_succeed() {
    let outcome = crate::run(Command::Completions {
        shell: clap_complete::Shell::Bash,
    })
    .unwrap();
    assert_eq!(outcome, Outcome::Success);
}

#[test]
fn test_ping_loopback() {
    let outcome = crate::run(Command::Ping(PingArgs {
        host: None,
        connect: loopback(),
    }))
    .unwrap();
    assert_eq!(outcome, Outcome::Success);
}

#[test]
fn test_ping_without_host_fails() {
    let err = crate::run(Command::Ping(PingArgs {
        host: None,
        connect: ConnectArgs::default(),
    }))
    .unwrap_err();
    assert!(matches!(err, crate::Error::NoHost), "{}", err);
}

#[test]
fn test_sync_push_over_loopback() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    fs::create_dir(src.path().join("dir")).unwrap();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(src.path().join("dir/b.txt"), "nested").unwrap();
    fs::write(dest.path().join("extra.txt"), "gone").unwrap();

    let args = sync_args(
        src.path().display().to_string(),
        format!("loopback:{}", dest.path().display()),
    );
    let outcome = crate::run(Command::Sync(args)).unwrap();

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "hello");
    assert_eq!(fs::read_to_string(dest.path().join("dir/b.txt")).unwrap(), "nested");
    assert!(!dest.path().join("extra.txt").exists());
}

#[test]
fn test_sync_dry_run_changes_nothing() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "hello").unwrap();

    let mut args = sync_args(
        src.path().display().to_string(),
        format!("loopback:{}", dest.path().display()),
    );
    args.dry_run = true;
    let outcome = crate::run(Command::Sync(args)).unwrap();

    assert_eq!(outcome, Outcome::Success);
    assert!(!dest.path().join("a.txt").exists());
}

#[test]
fn test_sync_single_file_into_directory() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let file = src.path().join("notes.txt");
    fs::write(&file, "remember").unwrap();
    fs::write(dest.path().join("kept.txt"), "mine").unwrap();

    let args = sync_args(
        file.display().to_string(),
        format!("loopback:{}/", dest.path().display()),
    );
    let outcome = crate::run(Command::Sync(args)).unwrap();

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(fs::read_to_string(dest.path().join("notes.txt")).unwrap(), "remember");
    assert!(dest.path().join("kept.txt").exists());
}

#[test]
fn test_sync_error_policy_refuses_deletion() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(dest.path().join("extra.txt"), "precious").unwrap();

    let mut args = sync_args(
        src.path().display().to_string(),
        format!("loopback:{}", dest.path().display()),
    );
    args.all_destructive_behaviour = Some(DeletePolicy::Error);
    let err = crate::run(Command::Sync(args)).unwrap_err();

    assert!(
        matches!(err, crate::Error::Sync(SyncError::Refused { .. })),
        "{}",
        err
    );
    assert!(dest.path().join("extra.txt").exists());
    assert!(!dest.path().join("a.txt").exists());
}

#[test]
fn test_sync_skip_policy_keeps_entries() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(dest.path().join("extra.txt"), "precious").unwrap();

    let mut args = sync_args(
        src.path().display().to_string(),
        format!("loopback:{}", dest.path().display()),
    );
    args.dest_entry_needs_deleting = Some(DeletePolicy::Skip);
    let outcome = crate::run(Command::Sync(args)).unwrap();

    assert_eq!(outcome, Outcome::Partial);
    assert!(dest.path().join("extra.txt").exists());
    assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "hello");
}

#[test]
fn test_sync_root_policy_guards_file_root() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    let root = dest.path().join("target");
    fs::write(&root, "a file").unwrap();

    let mut args = sync_args(
        src.path().display().to_string(),
        format!("loopback:{}", root.display()),
    );
    args.dest_root_needs_deleting = Some(DeletePolicy::Error);
    let err = crate::run(Command::Sync(args.clone())).unwrap_err();
    assert!(
        matches!(err, crate::Error::Sync(SyncError::Refused { .. })),
        "{}",
        err
    );
    assert_eq!(fs::read_to_string(&root).unwrap(), "a file");

    args.dest_root_needs_deleting = Some(DeletePolicy::Delete);
    let outcome = crate::run(Command::Sync(args)).unwrap();
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "hello");
}

#[test]
fn test_sync_two_local_sides_rejected() {
    let args = sync_args("/tmp/a".to_string(), "/tmp/b".to_string());
    let err = crate::run(Command::Sync(args)).unwrap_err();
    assert!(matches!(err, crate::Error::NeedOneRemote), "{}", err);
}

#[cfg(unix)]
#[test]
fn test_exec_propagates_exit_code() {
    let outcome = crate::run(Command::Exec(ExecArgs {
        host: None,
        cwd: None,
        timeout: None,
        command: vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
        connect: loopback(),
    }))
    .unwrap();
    assert_eq!(outcome, Outcome::Code(3));
}
