// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::path::{Path, PathBuf};

use cs_core::{
    Action, Capabilities, Direction, Endpoint, EntryKind, OsFamily, Permissions, Precondition,
    RelPath, Snapshot, StateKey, SyncPlan,
};
use yare::parameterized;

fn rel(s: &str) -> RelPath {
    RelPath::new(s).unwrap()
}

fn delete(path: &str, kind: EntryKind) -> SyncOp {
    SyncOp {
        path: rel(path),
        action: Action::Delete { kind },
        expected: Precondition::Any,
    }
}

fn create_dir(path: &str) -> SyncOp {
    SyncOp {
        path: rel(path),
        action: Action::CreateDir {
            permissions: Permissions::mode(0o755),
        },
        expected: Precondition::Absent,
    }
}

fn job(ops: Vec<SyncOp>, layout: Layout, replace_root: bool) -> SyncJob {
    SyncJob {
        plan: SyncPlan {
            direction: Direction::LocalToRemote,
            case_sensitive: true,
            ops,
            issues: Vec::new(),
        },
        local_root: PathBuf::from("/src"),
        remote_root: "/dest".to_string(),
        layout,
        replace_root,
        cleared: false,
        local_caps: Capabilities::for_os(OsFamily::Linux),
        state_key: StateKey::new(
            Path::new("/src"),
            &Endpoint::new("box", OsFamily::Linux),
            "/dest",
        ),
        source: Snapshot::new(),
        base: None,
    }
}

/// Deletes `old/x` and `old`, then creates `old` anew and an unrelated `new`.
fn replacing_tree() -> SyncJob {
    job(
        vec![
            delete("old/x", EntryKind::File),
            delete("old", EntryKind::Dir),
            create_dir("new"),
        ],
        Layout::Trees,
        false,
    )
}

fn names(job: &SyncJob) -> Vec<String> {
    job.plan.ops.iter().map(|op| op.to_string()).collect()
}

fn policies(entry: DeletePolicy, root: DeletePolicy) -> Destructive {
    Destructive { entry, root }
}

#[parameterized(
    prompt = { "prompt", DeletePolicy::Prompt },
    error = { "ERROR", DeletePolicy::Error },
    skip = { "skip", DeletePolicy::Skip },
    delete = { "delete", DeletePolicy::Delete },
    proceed = { "proceed", DeletePolicy::Delete },
)]
fn policy_parses(s: &str, expected: DeletePolicy) {
    assert_eq!(s.parse::<DeletePolicy>().unwrap(), expected);
}

#[test]
fn unknown_policy_rejected() {
    assert!("maybe".parse::<DeletePolicy>().unwrap_err().contains("expected prompt"));
}

#[test]
fn all_leaves_skip_alone() {
    let set = policies(DeletePolicy::Skip, DeletePolicy::Prompt).with_all(DeletePolicy::Error);
    assert_eq!(set, policies(DeletePolicy::Skip, DeletePolicy::Error));
}

#[test]
fn delete_policy_keeps_plan() {
    let mut job = replacing_tree();
    let mut confirm = ScriptedConfirm::default();
    guard(&mut job, &Destructive::default(), &mut confirm).unwrap();
    assert_eq!(names(&job), vec!["delete old/x", "delete old", "create-dir new"]);
    assert!(confirm.asked.is_empty());
}

#[test]
fn skip_drops_deletions_and_what_waits_on_them() {
    let mut job = replacing_tree();
    let skip = policies(DeletePolicy::Skip, DeletePolicy::Prompt);
    guard(&mut job, &skip, &mut ScriptedConfirm::default()).unwrap();
    assert_eq!(names(&job), vec!["create-dir new"]);
    let blocked: Vec<String> = job
        .plan
        .issues
        .iter()
        .map(|issue| issue.path().unwrap().to_string())
        .collect();
    assert_eq!(blocked, vec!["old/x", "old"]);
}

#[test]
fn declining_a_child_keeps_its_parent() {
    let mut job = replacing_tree();
    let ask = policies(DeletePolicy::Prompt, DeletePolicy::Prompt);
    let mut confirm = ScriptedConfirm::new([Answer::No, Answer::Yes]);
    guard(&mut job, &ask, &mut confirm).unwrap();
    // `old` must wait on `old/x`, so it is left alone too.
    assert_eq!(names(&job), vec!["create-dir new"]);
    assert_eq!(confirm.asked.len(), 2);
    assert!(confirm.asked[0].contains("delete old/x on the remote side"));
}

#[test]
fn answering_all_stops_asking() {
    let mut job = replacing_tree();
    let ask = policies(DeletePolicy::Prompt, DeletePolicy::Prompt);
    let mut confirm = ScriptedConfirm::new([Answer::All]);
    guard(&mut job, &ask, &mut confirm).unwrap();
    assert_eq!(names(&job).len(), 3);
    assert_eq!(confirm.asked.len(), 1);
}

#[test]
fn error_policy_refuses() {
    let mut job = replacing_tree();
    let err = guard(
        &mut job,
        &policies(DeletePolicy::Error, DeletePolicy::Delete),
        &mut ScriptedConfirm::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::Refused { flag: "--dest-entry-needs-deleting", .. }));
    assert!(err.to_string().contains("delete old/x"));
    assert_eq!(names(&job).len(), 3);
}

#[test]
fn unanswered_prompt_refuses() {
    let mut job = replacing_tree();
    let ask = policies(DeletePolicy::Prompt, DeletePolicy::Prompt);
    let err = guard(&mut job, &ask, &mut ScriptedConfirm::default()).unwrap_err();
    assert!(matches!(err, SyncError::Refused { .. }));
}

#[test]
fn root_replacement_follows_root_policy() {
    let mut job = job(vec![create_dir("a")], Layout::Trees, true);
    let err = guard(&mut job, &Destructive::default(), &mut ScriptedConfirm::default()).unwrap_err();
    assert!(matches!(err, SyncError::Refused { flag: "--dest-root-needs-deleting", .. }));

    let mut confirm = ScriptedConfirm::new([Answer::Yes]);
    guard(&mut job, &Destructive::default(), &mut confirm).unwrap();
    assert!(job.replace_root);
    assert_eq!(names(&job), vec!["create-dir a"]);
}

#[test]
fn skipped_root_replacement_empties_the_plan() {
    let mut job = job(vec![create_dir("a")], Layout::Trees, true);
    let skip = policies(DeletePolicy::Delete, DeletePolicy::Skip);
    guard(&mut job, &skip, &mut ScriptedConfirm::default()).unwrap();
    assert!(job.plan.is_empty());
    assert!(!job.replace_root);
    assert!(job.cleared);
}

#[test]
fn single_entry_deletions_count_as_root() {
    let layout = Layout::Entry {
        source: rel("report.txt"),
        name: rel("dest"),
    };
    let mut job = job(
        vec![delete("dest/x", EntryKind::File), delete("dest", EntryKind::Dir)],
        layout,
        false,
    );
    let entry_only = policies(DeletePolicy::Delete, DeletePolicy::Error);
    let err = guard(&mut job, &entry_only, &mut ScriptedConfirm::default()).unwrap_err();
    assert!(matches!(err, SyncError::Refused { flag: "--dest-root-needs-deleting", .. }));
}
