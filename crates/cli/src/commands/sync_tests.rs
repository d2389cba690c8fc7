// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::num::NonZeroUsize;

use cs_core::SymlinkPolicy;
use yare::parameterized;

use crate::cli::ConnectArgs;
use crate::engine::{DeletePolicy, Destructive};

fn args(src: Option<&str>, dest: Option<&str>) -> SyncArgs {
    SyncArgs {
        src: src.map(str::to_string),
        dest: dest.map(str::to_string),
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
        connect: ConnectArgs::default(),
    }
}

fn entry(src: &str, dest: &str) -> SyncEntry {
    SyncEntry {
        src: src.to_string(),
        dest: dest.to_string(),
        filters: vec!["-target".to_string()],
        symlinks: SymlinkPolicy::Follow,
        delete: true,
        overwrite_conflicts: false,
        dest_entry_needs_deleting: None,
        dest_root_needs_deleting: None,
    }
}

#[test]
fn push_resolves_local_to_remote() {
    let resolved = resolve(&entry("/home/me/proj", "winbox:C:\\work")).unwrap();
    assert_eq!(resolved.direction, Direction::LocalToRemote);
    assert_eq!(resolved.remote.host, "winbox");
    assert_eq!(resolved.remote.path, "C:\\work");
    assert!(resolved.local_root.is_absolute());
}

#[test]
fn pull_resolves_remote_to_local() {
    let resolved = resolve(&entry("box:/srv/logs", "logs")).unwrap();
    assert_eq!(resolved.direction, Direction::RemoteToLocal);
    assert!(resolved.local_root.is_absolute());
    assert!(resolved.local_root.ends_with("logs"));
}

#[test]
fn both_remote_is_rejected() {
    let err = resolve(&entry("a:/x", "b:/y")).unwrap_err();
    assert!(matches!(err, Error::NeedOneRemote));
}

#[test]
fn both_local_is_rejected() {
    let err = resolve(&entry("/x", "/y")).unwrap_err();
    assert!(matches!(err, Error::NeedOneRemote));
}

#[test]
fn command_line_pair_replaces_spec_entries() {
    let spec = vec![entry("/a", "box:/a"), entry("/b", "box:/b")];
    let entries = entries(&args(Some("/c"), Some("box:/c")), spec).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].src, "/c");
    assert!(entries[0].filters.is_empty());
    assert_eq!(entries[0].symlinks, SymlinkPolicy::Skip);
}

#[test]
fn spec_entries_used_without_pair() {
    let spec = vec![entry("/a", "box:/a"), entry("/b", "box:/b")];
    let entries = entries(&args(None, None), spec).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].filters, vec!["-target".to_string()]);
}

#[test]
fn flags_override_spec_entries() {
    let mut sync = args(None, None);
    sync.filter = vec!["+only".to_string()];
    sync.symlinks = Some(SymlinkPolicy::Preserve);
    sync.no_delete = true;
    sync.overwrite_conflicts = true;
    let entries = entries(&sync, vec![entry("/a", "box:/a")]).unwrap();
    assert_eq!(entries[0].filters, vec!["+only".to_string()]);
    assert_eq!(entries[0].symlinks, SymlinkPolicy::Preserve);
    assert!(!entries[0].delete);
    assert!(entries[0].overwrite_conflicts);
}

#[test]
fn nothing_to_sync() {
    let err = entries(&args(None, None), Vec::new()).unwrap_err();
    assert!(matches!(err, Error::NothingToSync));
}

#[parameterized(
    posix = { "box:/srv/out/", true },
    windows = { "box:C:\\out\\", true },
    plain = { "box:/srv/out", false },
)]
fn trailing_separator_means_into_dir(dest: &str, into_dir: bool) {
    let resolved = resolve(&entry("/home/me/notes.txt", dest)).unwrap();
    assert_eq!(resolved.into_dir, into_dir);
}

#[test]
fn deletion_policies_default_per_kind() {
    let entries = entries(&args(Some("/c"), Some("box:/c")), Vec::new()).unwrap();
    assert_eq!(entries[0].destructive(), Destructive::default());
    assert_eq!(entries[0].dest_entry_needs_deleting, Some(DeletePolicy::Delete));
    assert_eq!(entries[0].dest_root_needs_deleting, Some(DeletePolicy::Prompt));
}

#[test]
fn blanket_policy_spares_skip() {
    let mut spec = entry("/a", "box:/a");
    spec.dest_root_needs_deleting = Some(DeletePolicy::Skip);
    let mut sync = args(None, None);
    sync.all_destructive_behaviour = Some(DeletePolicy::Error);
    let entries = entries(&sync, vec![spec]).unwrap();
    assert_eq!(
        entries[0].destructive(),
        Destructive {
            entry: DeletePolicy::Error,
            root: DeletePolicy::Skip,
        }
    );
}

#[test]
fn specific_policy_beats_blanket() {
    let mut sync = args(Some("/c"), Some("box:/c"));
    sync.all_destructive_behaviour = Some(DeletePolicy::Error);
    sync.dest_entry_needs_deleting = Some(DeletePolicy::Delete);
    let entries = entries(&sync, Vec::new()).unwrap();
    assert_eq!(
        entries[0].destructive(),
        Destructive {
            entry: DeletePolicy::Delete,
            root: DeletePolicy::Error,
        }
    );
}
