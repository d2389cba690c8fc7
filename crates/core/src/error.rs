// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for cs-core operations.

use thiserror::Error;

/// All possible errors that can occur in cs-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path escapes sync root: {0}")]
    PathEscapesRoot(String),

    #[error("sync root not found: {0}")]
    RootNotFound(String),

    #[error(
        "invalid filter '{0}'\n  hint: filters start with '+' (include) or '-' (exclude) followed by a regex"
    )]
    InvalidFilter(String),

    #[error("invalid filter regex '{pattern}': {source}")]
    FilterRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error("precondition failed for {path}: {reason}")]
    PreconditionFailed { path: String, reason: String },

    #[error("content of {path} changed while it was being copied")]
    ContentChanged { path: String },

    #[error("unsupported on this endpoint: {0}")]
    Unsupported(String),

    #[error("state directory unavailable\n  hint: set CROSSYNC_STATE_DIR to a writable directory")]
    NoStateDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Builds an [`Error::InvalidPath`] from anything displayable.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for cs-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
