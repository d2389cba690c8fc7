// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cs-core: OS-neutral data model for crossync
//!
//! This crate provides the endpoint and capability model, relative paths,
//! file records, filters, snapshots, local tree operations, sync planning
//! and persisted base state shared by the crossync CLI and the cs-peer
//! service.

pub mod endpoint;
pub mod error;
pub mod filter;
pub mod path;
pub mod plan;
pub mod record;
pub mod snapshot;
pub mod state;
pub mod tree;

pub use endpoint::{Capabilities, Endpoint, LineEnding, NameRules, OsFamily, PermissionModel};
pub use error::{Error, Result};
pub use filter::FilterSet;
pub use path::RelPath;
pub use plan::{
    plan, Action, Direction, PlanIssue, PlanOptions, PlanSummary, Side, SyncOp, SyncPlan,
};
pub use record::{ContentHash, ContentHasher, EntryKind, FileRecord, Permissions};
pub use snapshot::{
    root_kind, scan, scan_named, scan_root, RootKind, ScanOptions, Snapshot,
    SymlinkPolicy,
};
pub use state::{BaseState, Fingerprint, StateKey, StateStore};
pub use tree::{LocalTree, PendingWrite, Precondition};
