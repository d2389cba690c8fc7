// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// The binary with colors off and no state written outside the test.
pub fn crossync() -> Command {
    let mut cmd = cargo_bin_cmd!("crossync");
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

/// `loopback:<path>`, a remote location served in-process by `--loopback`.
pub fn loopback(path: &Path) -> String {
    format!("loopback:{}", path.display())
}

/// A source tree with a file at the top and one nested.
pub fn source_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("dir")).unwrap();
    std::fs::write(temp.path().join("a.txt"), "hello").unwrap();
    std::fs::write(temp.path().join("dir/b.txt"), "nested").unwrap();
    temp
}
