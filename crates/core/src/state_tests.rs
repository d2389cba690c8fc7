// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::endpoint::OsFamily;
use crate::record::Permissions;
use tempfile::TempDir;

fn key(remote_root: &str) -> StateKey {
    StateKey {
        local_root: "/home/me/proj".to_string(),
        endpoint: Endpoint::new("winbox", OsFamily::Windows).identity(),
        remote_root: remote_root.to_string(),
    }
}

fn file(path: &str, data: &[u8]) -> FileRecord {
    FileRecord::file(
        RelPath::new(path).unwrap(),
        data.len() as u64,
        ContentHash::of_bytes(data),
        Permissions::mode(0o644),
    )
}

#[test]
fn missing_state_loads_as_none() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("state"));
    assert!(store.load(&key("C:/work")).unwrap().is_none());
}

#[test]
fn save_then_load() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());
    let mut state = BaseState::new(key("C:/work"));
    state.record(&file("a.txt", b"one"));
    state.record(&FileRecord::dir(
        RelPath::new("d").unwrap(),
        Permissions::mode(0o755),
    ));
    state.touch();
    store.save(&state).unwrap();

    let loaded = store.load(&key("C:/work")).unwrap().unwrap();
    assert_eq!(loaded, state);
    assert!(loaded
        .get(&RelPath::new("a.txt").unwrap())
        .unwrap()
        .matches(&file("a.txt", b"one")));
    assert!(!loaded
        .get(&RelPath::new("a.txt").unwrap())
        .unwrap()
        .matches(&file("a.txt", b"two")));
}

#[test]
fn pairs_do_not_share_state() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());
    let mut state = BaseState::new(key("C:/work"));
    state.record(&file("a.txt", b"one"));
    store.save(&state).unwrap();

    assert_ne!(key("C:/work").file_name(), key("C:/other").file_name());
    assert!(store.load(&key("C:/other")).unwrap().is_none());
}

#[test]
fn forget_and_retain() {
    let mut state = BaseState::new(key("r"));
    state.record(&file("a", b"1"));
    state.record(&file("b", b"2"));
    state.record(&file("c", b"3"));
    state.forget(&RelPath::new("a").unwrap());
    state.retain(|path| path != "b");
    assert_eq!(state.len(), 1);
    assert!(state.get(&RelPath::new("c").unwrap()).is_some());
}

#[test]
fn fingerprint_of_symlink() {
    let link = FileRecord::symlink(RelPath::new("l").unwrap(), "t", Permissions::mode(0o777));
    assert_eq!(
        Fingerprint::of(&link),
        Some(Fingerprint::Symlink {
            target: "t".to_string()
        })
    );
}
