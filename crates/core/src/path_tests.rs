// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    empty = { "" },
    leading_slash = { "/a" },
    trailing_slash = { "a/" },
    double_slash = { "a//b" },
    dot = { "a/./b" },
    dotdot = { "a/../b" },
    nul = { "a\0b" },
)]
fn rejects_invalid(path: &str) {
    assert!(RelPath::new(path).is_err());
}

#[parameterized(
    single = { "a.txt", 1 },
    nested = { "dir/sub/file", 3 },
    backslash_in_name = { "odd\\name", 1 },
)]
fn accepts_valid(path: &str, depth: usize) {
    let rel = RelPath::new(path).unwrap();
    assert_eq!(rel.as_str(), path);
    assert_eq!(rel.depth(), depth);
}

#[test]
fn parent_and_ancestors() {
    let rel = RelPath::new("a/b/c").unwrap();
    assert_eq!(rel.parent().unwrap().as_str(), "a/b");
    assert_eq!(rel.file_name(), "c");
    let ancestors: Vec<String> = rel.ancestors().into_iter().map(String::from).collect();
    assert_eq!(ancestors, vec!["a/b".to_string(), "a".to_string()]);
    assert!(RelPath::new("a").unwrap().parent().is_none());
}

#[parameterized(
    child = { "a", "a/b", true },
    grandchild = { "a", "a/b/c", true },
    sibling_prefix = { "a", "ab/c", false },
    itself = { "a", "a", false },
    reverse = { "a/b", "a", false },
)]
fn ancestor_relation(ancestor: &str, other: &str, expected: bool) {
    let a = RelPath::new(ancestor).unwrap();
    let b = RelPath::new(other).unwrap();
    assert_eq!(a.is_ancestor_of(&b), expected);
}

#[test]
fn native_roundtrip() {
    let root = Path::new("root");
    let rel = RelPath::new("dir/file.txt").unwrap();
    let native = rel.to_native(root);
    assert_eq!(native, root.join("dir").join("file.txt"));
    let back = RelPath::from_native(native.strip_prefix(root).unwrap()).unwrap();
    assert_eq!(back, rel);
}

#[test]
fn from_native_rejects_parent_dir() {
    assert!(RelPath::from_native(Path::new("../x")).is_err());
}

#[test]
fn fold_key_ignores_case() {
    let a = RelPath::new("Dir/File.TXT").unwrap();
    let b = RelPath::new("dir/file.txt").unwrap();
    assert_eq!(a.fold_key(), b.fold_key());
}

#[parameterized(
    colon = { "a:b" },
    backslash = { "odd\\name" },
    question = { "what?" },
    trailing_dot = { "dir/name." },
    trailing_space = { "name " },
    reserved = { "sub/CON" },
    reserved_with_ext = { "nul.txt" },
)]
fn unrepresentable_on_windows(path: &str) {
    let rel = RelPath::new(path).unwrap();
    assert!(rel.check_representable(NameRules::Windows).is_err());
    assert!(rel.check_representable(NameRules::Posix).is_ok());
}

#[test]
fn ordinary_names_are_representable_on_windows() {
    let rel = RelPath::new("src/main.rs").unwrap();
    assert!(rel.check_representable(NameRules::Windows).is_ok());
    let rel = RelPath::new("console/log.txt").unwrap();
    assert!(rel.check_representable(NameRules::Windows).is_ok());
}

#[test]
fn serde_validates() {
    let ok: RelPath = serde_json::from_str("\"a/b\"").unwrap();
    assert_eq!(ok.as_str(), "a/b");
    assert!(serde_json::from_str::<RelPath>("\"../x\"").is_err());
}

#[test]
fn link_targets_use_forward_slashes() {
    assert_eq!(normalize_link_target(Path::new("..\\x\\y")), "../x/y");
}
