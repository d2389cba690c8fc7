// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::time::Duration;

use cs_core::{ContentHash, Direction, EntryKind, FileRecord, OsFamily, Permissions, Precondition, RelPath};
use yare::parameterized;

use crate::engine::{FailedOp, SyncError};

fn path(p: &str) -> RelPath {
    RelPath::new(p).unwrap()
}

fn sample_plan() -> SyncPlan {
    let source = FileRecord::file(
        path("a.txt"),
        2048,
        ContentHash::of_bytes(b"a"),
        Permissions::mode(0o644),
    );
    SyncPlan {
        direction: Direction::LocalToRemote,
        case_sensitive: true,
        ops: vec![
            SyncOp {
                path: path("dir/old.txt"),
                action: Action::Delete {
                    kind: EntryKind::File,
                },
                expected: Precondition::Any,
            },
            SyncOp {
                path: path("a.txt"),
                action: Action::CreateFile {
                    source,
                    permissions: Permissions::mode(0o644),
                },
                expected: Precondition::Absent,
            },
        ],
        issues: vec![PlanIssue::UnsupportedSymlink {
            path: path("link"),
        }],
    }
}

#[parameterized(
    zero = { 0, "0 B" },
    small = { 512, "512 B" },
    one_kib = { 1024, "1.0 KiB" },
    fractional = { 1536, "1.5 KiB" },
    mib = { 3 * 1024 * 1024, "3.0 MiB" },
    gib = { 5 * 1024 * 1024 * 1024, "5.0 GiB" },
)]
fn bytes(input: u64, expected: &str) {
    assert_eq!(format_bytes(input), expected);
}

#[test]
fn plan_lists_ops_and_issues() {
    let lines = format_plan("push ./a -> box:/b", &sample_plan(), false);
    assert_eq!(lines[0], "push ./a -> box:/b (2 operations, 2.0 KiB to transfer)");
    assert_eq!(lines[1], "  delete          dir/old.txt");
    assert_eq!(lines[2], "  create-file     a.txt (2.0 KiB)");
    assert!(lines[3].contains("link"));
    assert_eq!(lines.len(), 4);
}

#[test]
fn empty_plan_is_up_to_date() {
    let plan = SyncPlan {
        direction: Direction::RemoteToLocal,
        case_sensitive: true,
        ops: Vec::new(),
        issues: Vec::new(),
    };
    let lines = format_plan("pull", &plan, false);
    assert_eq!(lines[1], "  up to date");
}

#[test]
fn colored_plan_contains_escapes() {
    let lines = format_plan("push", &sample_plan(), true);
    assert!(lines[0].contains("\x1b[38;5;"));
}

fn sample_report() -> SyncReport {
    SyncReport {
        direction: Direction::LocalToRemote,
        succeeded: vec![CompletedOp {
            path: path("a.txt"),
            action: "create-file",
            side: Side::Remote,
            bytes: 2048,
        }],
        failed: vec![FailedOp {
            path: path("b.txt"),
            action: "update-file",
            side: Side::Remote,
            error: SyncError::SourceChanged,
        }],
        issues: Vec::new(),
        stats: SyncStats {
            files_created: 1,
            bytes_transferred: 2048,
            failed: 1,
            ..SyncStats::default()
        },
        elapsed: Duration::from_millis(1500),
    }
}

#[test]
fn report_shows_failures_and_summary() {
    let lines = format_report("push", &sample_report(), false);
    assert_eq!(
        lines[1],
        "  update-file b.txt on remote: source changed since planning"
    );
    assert_eq!(
        lines[2],
        "  1 succeeded, 1 failed, 0 issues, 2.0 KiB in 1.5s"
    );
}

#[test]
fn stats_skip_zero_counts() {
    let lines = format_stats(&sample_report().stats);
    similar_asserts::assert_eq!(
        lines,
        vec![
            "  files created     1".to_string(),
            "  failed            1".to_string(),
            "  transferred       2.0 KiB".to_string(),
        ]
    );
}

#[test]
fn endpoint_rows() {
    let endpoint = Endpoint::new("winbox", OsFamily::Windows);
    let lines = format_endpoint(&endpoint, false);
    assert!(lines[0].starts_with("winbox"));
    let text = lines.join("\n");
    assert!(text.contains("insensitive"));
    assert!(text.contains("crlf"));
    assert!(text.contains("read-only flag"));
    assert!(text.contains("windows"));
}

#[test]
fn report_json_flattens_errors() {
    let report = sample_report();
    let json = serde_json::to_value(ReportJson::new("./a", "box:/b", &report)).unwrap();
    assert_eq!(json["direction"], "local-to-remote");
    assert_eq!(json["failed"][0]["path"], "b.txt");
    assert_eq!(json["failed"][0]["error"], "source changed since planning");
    assert_eq!(json["succeeded"][0]["bytes"], 2048);
    assert_eq!(json["stats"]["files_created"], 1);
    assert_eq!(json["elapsed_ms"], 1500);
}
