// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use cs_core::SymlinkPolicy;

use crate::engine::DeletePolicy;

fn sync_args(args: &[&str]) -> SyncArgs {
    let mut full = vec!["crossync", "sync"];
    full.extend_from_slice(args);
    match parse(&full).unwrap().command {
        Command::Sync(args) => args,
        other => panic!("expected sync, got {:?}", other),
    }
}

#[test]
fn test_sync_defaults() {
    let args = sync_args(&["./proj", "box:/srv/proj"]);
    assert_eq!(args.src.as_deref(), Some("./proj"));
    assert_eq!(args.dest.as_deref(), Some("box:/srv/proj"));
    assert!(args.filter.is_empty());
    assert!(!args.dry_run);
    assert!(!args.no_delete);
    assert_eq!(args.symlinks, None);
    assert!(!args.overwrite_conflicts);
    assert!(!args.no_progress);
    assert_eq!(args.all_destructive_behaviour, None);
    assert_eq!(args.jobs.get(), 1);
    assert_eq!(args.output, OutputFormat::Text);
    assert!(!args.connect.loopback);
    assert_eq!(args.connect.port, None);
}

#[test]
fn test_sync_all_flags() {
    let args = sync_args(&[
        "./proj",
        "box:/srv/proj",
        "-f",
        "-target/",
        "--filter",
        "+keep",
        "--dry-run",
        "--no-delete",
        "--symlinks",
        "preserve",
        "--overwrite-conflicts",
        "--no-state",
        "-j",
        "4",
        "--timeout",
        "60",
        "--stats",
        "--no-progress",
        "--dest-entry-needs-deleting",
        "skip",
        "--dest-root-needs-deleting",
        "proceed",
        "--all-destructive-behaviour",
        "error",
        "-o",
        "json",
        "-p",
        "9000",
        "--websocket",
        "--loopback",
    ]);
    assert_eq!(args.filter, vec!["-target/".to_string(), "+keep".to_string()]);
    assert!(args.dry_run);
    assert!(args.no_delete);
    assert_eq!(args.symlinks, Some(SymlinkPolicy::Preserve));
    assert!(args.overwrite_conflicts);
    assert!(args.no_state);
    assert_eq!(args.jobs.get(), 4);
    assert_eq!(args.timeout, Some(60));
    assert!(args.stats);
    assert!(args.no_progress);
    assert_eq!(args.dest_entry_needs_deleting, Some(DeletePolicy::Skip));
    assert_eq!(args.dest_root_needs_deleting, Some(DeletePolicy::Delete));
    assert_eq!(args.all_destructive_behaviour, Some(DeletePolicy::Error));
    assert_eq!(args.output, OutputFormat::Json);
    assert_eq!(args.connect.port, Some(9000));
    assert!(args.connect.websocket);
    assert!(args.connect.loopback);
}

#[test]
fn test_sync_spec_only() {
    let args = sync_args(&["--spec", "sync.toml"]);
    assert_eq!(args.src, None);
    assert_eq!(args.connect.spec.as_deref(), Some(std::path::Path::new("sync.toml")));
}

#[test]
fn test_sync_src_requires_dest() {
    assert!(parse(&["crossync", "sync", "./proj"]).is_err());
}

#[test]
fn test_sync_rejects_zero_jobs() {
    assert!(parse(&["crossync", "sync", "a", "b:c", "-j", "0"]).is_err());
}

#[test]
fn test_sync_rejects_zero_timeout() {
    assert!(parse(&["crossync", "sync", "a", "b:c", "--timeout", "0"]).is_err());
}

#[test]
fn test_sync_rejects_unknown_symlink_policy() {
    assert!(parse(&["crossync", "sync", "a", "b:c", "--symlinks", "copy"]).is_err());
}

#[test]
fn test_sync_rejects_unknown_delete_policy() {
    assert!(parse(&["crossync", "sync", "a", "b:c", "--dest-root-needs-deleting", "maybe"]).is_err());
}
