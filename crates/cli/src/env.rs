// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! All runtime environment variables read by the CLI are defined here
//! with typed accessor functions. The variable name constants are generated
//! by `build.rs` and live in the [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns `true` if `NO_COLOR=1`.
pub fn no_color() -> bool {
    std::env::var(vars::NO_COLOR).is_ok_and(|v| v == "1")
}

/// Returns `true` if `COLOR=1`.
pub fn force_color() -> bool {
    std::env::var(vars::COLOR).is_ok_and(|v| v == "1")
}

/// Returns the value of `CROSSYNC_REMOTE_PEER` if set and not blank.
pub fn remote_peer() -> Option<String> {
    std::env::var(vars::CROSSYNC_REMOTE_PEER)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Returns the value of `CROSSYNC_SPEC` if set.
pub fn spec_file() -> Option<PathBuf> {
    std::env::var(vars::CROSSYNC_SPEC).ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
