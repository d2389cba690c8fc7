// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::engine::SyncError;
use crate::exec::ExecutionError;
use crate::session::{NegotiationError, SessionError};
use crate::transport::TransportError;

/// All errors surfaced by the crossync CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("exactly one of source and destination must be remote\n  hint: write the remote side as host:path, e.g. winbox:C:\\work")]
    NeedOneRemote,

    #[error("nothing to sync\n  hint: pass SRC and DEST, or --spec with at least one [[sync]] entry")]
    NothingToSync,

    #[error("no peer host given\n  hint: pass HOST, or set host in the [remote] table of a --spec file")]
    NoHost,

    #[error("cannot read spec file {path}: {source}")]
    SpecRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid spec file {path}: {reason}")]
    SpecParse { path: String, reason: String },

    #[error("{field} must be at least 1")]
    ZeroNotAllowed { field: &'static str },

    #[error("connection failed: {0}")]
    Transport(#[from] TransportError),

    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Core(#[from] cs_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
