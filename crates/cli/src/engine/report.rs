// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome of applying a sync plan.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use cs_core::{Action, Direction, EntryKind, PlanIssue, RelPath, Side, SyncOp};
use cs_proto::{RemoteError, RemoteErrorKind};

use crate::session::SessionError;

/// Why a sync, or one of its operations, failed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("destination changed since planning: {reason}")]
    PreconditionFailed { reason: String },

    #[error("source changed since planning")]
    SourceChanged,

    #[error("not attempted: {action} of {path} failed")]
    Blocked { path: RelPath, action: &'static str },

    #[error("peer error: {0}")]
    Remote(RemoteError),

    #[error(transparent)]
    Local(cs_core::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("sync run timed out after {0:?}")]
    TimedOut(Duration),

    #[error("sync run cancelled")]
    Cancelled,

    #[error("no usable session")]
    NoSession,

    #[error("cannot snapshot {side} root '{root}': {reason}")]
    Snapshot {
        side: Side,
        root: String,
        reason: String,
    },

    #[error("refusing to {what}\n  hint: pass {flag} delete to allow it, or skip to leave it")]
    Refused { what: String, flag: &'static str },

    #[error("invalid filter: {0}")]
    Filter(cs_core::Error),

    #[error("base state: {0}")]
    State(cs_core::Error),
}

impl SyncError {
    /// Classifies a local tree failure.
    pub fn local(err: cs_core::Error) -> Self {
        match err {
            cs_core::Error::PreconditionFailed { reason, .. } => {
                SyncError::PreconditionFailed { reason }
            }
            cs_core::Error::ContentChanged { .. } => SyncError::SourceChanged,
            other => SyncError::Local(other),
        }
    }

    /// Classifies a failure reported by the peer.
    pub fn remote(err: RemoteError) -> Self {
        match err.kind {
            RemoteErrorKind::PreconditionFailed => SyncError::PreconditionFailed {
                reason: err.message,
            },
            RemoteErrorKind::ContentChanged => SyncError::SourceChanged,
            _ => SyncError::Remote(err),
        }
    }

    /// Classifies a session failure; peer-reported failures keep their kind.
    pub fn session(err: SessionError) -> Self {
        match err {
            SessionError::Remote { error, .. } => SyncError::remote(error),
            other => SyncError::Session(other),
        }
    }
}

/// An operation that was carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedOp {
    pub path: RelPath,
    pub action: &'static str,
    pub side: Side,
    /// File content transferred.
    pub bytes: u64,
}

/// An operation that failed or was never attempted.
#[derive(Debug)]
pub struct FailedOp {
    pub path: RelPath,
    pub action: &'static str,
    pub side: Side,
    pub error: SyncError,
}

impl fmt::Display for FailedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on {}: {}",
            self.action, self.path, self.side, self.error
        )
    }
}

/// Counts of work done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub files_created: usize,
    pub files_updated: usize,
    pub files_deleted: usize,
    pub dirs_created: usize,
    pub dirs_deleted: usize,
    pub symlinks_created: usize,
    pub symlinks_deleted: usize,
    pub permissions_set: usize,
    pub bytes_transferred: u64,
    pub failed: usize,
}

impl SyncStats {
    /// Counts a succeeded operation.
    pub fn add(&mut self, op: &SyncOp, bytes: u64) {
        match &op.action {
            Action::CreateDir { .. } => self.dirs_created += 1,
            Action::CreateFile { .. } => self.files_created += 1,
            Action::UpdateFile { .. } => self.files_updated += 1,
            Action::CreateSymlink { .. } => self.symlinks_created += 1,
            Action::Delete { kind } => match kind {
                EntryKind::File => self.files_deleted += 1,
                EntryKind::Dir => self.dirs_deleted += 1,
                EntryKind::Symlink { .. } => self.symlinks_deleted += 1,
            },
            Action::SetPermissions { .. } => self.permissions_set += 1,
        }
        self.bytes_transferred += bytes;
    }

    /// Operations carried out.
    pub fn total(&self) -> usize {
        self.files_created
            + self.files_updated
            + self.files_deleted
            + self.dirs_created
            + self.dirs_deleted
            + self.symlinks_created
            + self.symlinks_deleted
            + self.permissions_set
    }
}

/// What a sync run did, path by path.
#[derive(Debug)]
pub struct SyncReport {
    pub direction: Direction,
    pub succeeded: Vec<CompletedOp>,
    pub failed: Vec<FailedOp>,
    /// Paths the planner left alone (conflicts, collisions...).
    pub issues: Vec<PlanIssue>,
    pub stats: SyncStats,
    pub elapsed: Duration,
}

impl SyncReport {
    /// Every operation succeeded and nothing was left unresolved.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.issues.is_empty()
    }

    /// Some paths did not converge.
    pub fn is_partial(&self) -> bool {
        !self.is_clean()
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
