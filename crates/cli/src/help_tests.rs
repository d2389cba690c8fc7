// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn commands_lists_every_subcommand() {
    let text = commands();
    for name in ["sync", "exec", "ping", "completions"] {
        assert!(text.contains(name), "missing {}", name);
    }
}

#[test]
fn template_keeps_clap_placeholders() {
    let template = template();
    assert!(template.contains("{usage}"));
    assert!(template.contains("{options}"));
    assert!(template.contains("{after-help}"));
    assert!(template.contains("Options:"));
}

#[test]
fn quickstart_mentions_both_directions() {
    let text = quickstart();
    assert!(text.contains("Push a tree"));
    assert!(text.contains("Pull a tree"));
}
