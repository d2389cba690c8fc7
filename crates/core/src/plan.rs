// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync planning.
//!
//! [`plan`] compares a source snapshot with a destination snapshot (and,
//! when tracked, the base state of the pair) and produces the operations
//! that make the destination converge. Planning is pure: it reads no file
//! system and talks to no peer.
//!
//! Operations come out in three phases:
//!
//! 1. deletions, deepest first, so a directory is removed only after
//!    everything below it;
//! 2. creations, updates and permission grants, shallowest first, so a
//!    directory exists before anything is created inside it;
//! 3. permission changes that remove owner write from directories,
//!    deepest first, so they never block phase 2.
//!
//! [`SyncPlan::dependencies`] turns that total order into the partial
//! order used for parallel application: an operation waits only for
//! earlier operations on the same path, an ancestor or a descendant.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::endpoint::Capabilities;
use crate::path::RelPath;
use crate::record::{EntryKind, FileRecord, Permissions};
use crate::snapshot::Snapshot;
use crate::state::BaseState;
use crate::tree::Precondition;

/// One side of a sync pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    LocalToRemote,
    RemoteToLocal,
}

impl Direction {
    pub fn source(&self) -> Side {
        match self {
            Direction::LocalToRemote => Side::Local,
            Direction::RemoteToLocal => Side::Remote,
        }
    }

    pub fn destination(&self) -> Side {
        match self {
            Direction::LocalToRemote => Side::Remote,
            Direction::RemoteToLocal => Side::Local,
        }
    }

    pub fn reversed(&self) -> Direction {
        match self {
            Direction::LocalToRemote => Direction::RemoteToLocal,
            Direction::RemoteToLocal => Direction::LocalToRemote,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::LocalToRemote => write!(f, "local-to-remote"),
            Direction::RemoteToLocal => write!(f, "remote-to-local"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local-to-remote" | "push" => Ok(Direction::LocalToRemote),
            "remote-to-local" | "pull" => Ok(Direction::RemoteToLocal),
            _ => Err(format!("invalid direction: '{}'", s)),
        }
    }
}

/// Knobs for [`plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub direction: Direction,
    /// Delete destination entries that are absent from the source.
    pub delete_extraneous: bool,
    /// Let the authoritative side win when both sides changed.
    pub overwrite_conflicts: bool,
}

impl PlanOptions {
    pub fn new(direction: Direction) -> Self {
        PlanOptions {
            direction,
            delete_extraneous: true,
            overwrite_conflicts: false,
        }
    }
}

/// What an operation does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateDir {
        permissions: Permissions,
    },
    CreateFile {
        source: FileRecord,
        permissions: Permissions,
    },
    UpdateFile {
        source: FileRecord,
        permissions: Permissions,
    },
    /// Creates a link, replacing an existing link with another target.
    CreateSymlink {
        target: String,
    },
    Delete {
        kind: EntryKind,
    },
    SetPermissions {
        permissions: Permissions,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateDir { .. } => "create-dir",
            Action::CreateFile { .. } => "create-file",
            Action::UpdateFile { .. } => "update-file",
            Action::CreateSymlink { .. } => "create-symlink",
            Action::Delete { .. } => "delete",
            Action::SetPermissions { .. } => "set-permissions",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Action::Delete { .. })
    }

    /// Bytes that must be transferred to carry out the action.
    pub fn transfer_size(&self) -> u64 {
        match self {
            Action::CreateFile { source, .. } | Action::UpdateFile { source, .. } => source.size,
            _ => 0,
        }
    }
}

/// A single planned operation on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOp {
    /// Destination path (in the destination's spelling).
    pub path: RelPath,
    pub action: Action,
    /// What the destination held when the plan was made.
    pub expected: Precondition,
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.name(), self.path)
    }
}

/// Something the planner refused to resolve on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum PlanIssue {
    /// Both sides changed since they last agreed.
    Conflict {
        path: RelPath,
        source: Option<FileRecord>,
        destination: Option<FileRecord>,
    },
    /// Source names that differ only in case, on a case-insensitive
    /// destination.
    CaseCollision { paths: Vec<RelPath> },
    /// The name cannot be stored on the destination.
    Unrepresentable { path: RelPath, reason: String },
    /// A symlink towards a destination that cannot create links.
    UnsupportedSymlink { path: RelPath },
    /// Replacing a directory with a non-directory needs deletion, which
    /// is disabled.
    Blocked { path: RelPath, reason: String },
}

impl PlanIssue {
    /// The path the issue is about; the first name of a collision.
    pub fn path(&self) -> Option<&RelPath> {
        match self {
            PlanIssue::Conflict { path, .. }
            | PlanIssue::Unrepresentable { path, .. }
            | PlanIssue::UnsupportedSymlink { path }
            | PlanIssue::Blocked { path, .. } => Some(path),
            PlanIssue::CaseCollision { paths } => paths.first(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PlanIssue::Conflict { .. })
    }
}

impl fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanIssue::Conflict { path, .. } => {
                write!(f, "conflict: {} changed on both sides", path)
            }
            PlanIssue::CaseCollision { paths } => {
                let names: Vec<&str> = paths.iter().map(RelPath::as_str).collect();
                write!(f, "case collision: {}", names.join(", "))
            }
            PlanIssue::Unrepresentable { path, reason } => {
                write!(f, "unrepresentable on destination: {} ({})", path, reason)
            }
            PlanIssue::UnsupportedSymlink { path } => {
                write!(f, "destination cannot create symlinks: {}", path)
            }
            PlanIssue::Blocked { path, reason } => write!(f, "blocked: {} ({})", path, reason),
        }
    }
}

/// Counts of planned work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create_dirs: usize,
    pub create_files: usize,
    pub update_files: usize,
    pub create_symlinks: usize,
    pub deletes: usize,
    pub set_permissions: usize,
    pub bytes: u64,
}

impl PlanSummary {
    pub fn add(&mut self, op: &SyncOp) {
        match &op.action {
            Action::CreateDir { .. } => self.create_dirs += 1,
            Action::CreateFile { .. } => self.create_files += 1,
            Action::UpdateFile { .. } => self.update_files += 1,
            Action::CreateSymlink { .. } => self.create_symlinks += 1,
            Action::Delete { .. } => self.deletes += 1,
            Action::SetPermissions { .. } => self.set_permissions += 1,
        }
        self.bytes += op.action.transfer_size();
    }
}

/// The ordered operations of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub direction: Direction,
    /// Whether destination paths compare case-sensitively.
    pub case_sensitive: bool,
    pub ops: Vec<SyncOp>,
    pub issues: Vec<PlanIssue>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for op in &self.ops {
            summary.add(op);
        }
        summary
    }

    /// For each operation, the indices of earlier operations it must wait
    /// for.
    pub fn dependencies(&self) -> Vec<Vec<usize>> {
        let key = |path: &RelPath| path_key(path, self.case_sensitive);
        // Ops seen so far, at their own path and under each ancestor.
        let mut at_path: HashMap<String, usize> = HashMap::new();
        let mut below: HashMap<String, Vec<usize>> = HashMap::new();
        let mut deps = Vec::with_capacity(self.ops.len());

        for (index, op) in self.ops.iter().enumerate() {
            let mut mine: Vec<usize> = Vec::new();
            let own = key(&op.path);
            if let Some(&prev) = at_path.get(&own) {
                mine.push(prev);
            }
            let ancestors = op.path.ancestors();
            for ancestor in &ancestors {
                if let Some(&prev) = at_path.get(&key(ancestor)) {
                    mine.push(prev);
                }
            }
            if let Some(under) = below.get(&own) {
                mine.extend(under.iter().copied());
            }
            mine.sort_unstable();
            mine.dedup();
            deps.push(mine);

            at_path.insert(own, index);
            for ancestor in &ancestors {
                below.entry(key(ancestor)).or_default().push(index);
            }
        }
        deps
    }
}

fn path_key(path: &RelPath, case_sensitive: bool) -> String {
    if case_sensitive {
        path.as_str().to_string()
    } else {
        path.fold_key()
    }
}

/// Computes the operations that make `destination` match `source`.
///
/// `destination_caps` decide case folding, representable names, symlink
/// support and the permission model operations are expressed in. `base`
/// is the last known common state; without it no conflicts are reported.
pub fn plan(
    source: &Snapshot,
    destination: &Snapshot,
    base: Option<&BaseState>,
    options: &PlanOptions,
    destination_caps: &Capabilities,
) -> SyncPlan {
    Planner {
        base,
        options,
        caps: destination_caps,
        issues: Vec::new(),
        excluded: HashSet::new(),
        deletes: Vec::new(),
        creates: Vec::new(),
        deferred: Vec::new(),
    }
    .run(source, destination)
}

struct Planner<'a> {
    base: Option<&'a BaseState>,
    options: &'a PlanOptions,
    caps: &'a Capabilities,
    issues: Vec<PlanIssue>,
    /// Keys whose subtree is left alone on both sides.
    excluded: HashSet<String>,
    deletes: Vec<SyncOp>,
    creates: Vec<SyncOp>,
    deferred: Vec<SyncOp>,
}

impl Planner<'_> {
    fn key(&self, path: &RelPath) -> String {
        path_key(path, self.caps.case_sensitive)
    }

    fn is_excluded(&self, path: &RelPath) -> bool {
        self.excluded.contains(&self.key(path))
            || path
                .ancestors()
                .iter()
                .any(|a| self.excluded.contains(&self.key(a)))
    }

    fn run(mut self, source: &Snapshot, destination: &Snapshot) -> SyncPlan {
        let sources = self.eligible_sources(source);
        let destinations: HashMap<String, &FileRecord> = destination
            .iter()
            .map(|record| (self.key(&record.path), record))
            .collect();

        for (key, src) in &sources {
            if self.is_excluded_below(&src.path) {
                continue;
            }
            match destinations.get(key) {
                None => {
                    if self.is_conflict(&src.path, Some(src), None) {
                        self.conflict(&src.path, Some(src), None);
                    } else {
                        self.create(src);
                    }
                }
                Some(dest) => self.compare(src, dest),
            }
        }

        let mut extraneous: Vec<&FileRecord> = destinations
            .iter()
            .filter(|(key, _)| !sources.contains_key(*key))
            .map(|(_, record)| *record)
            .collect();
        extraneous.sort_by(|a, b| a.path.cmp(&b.path));
        for dest in extraneous {
            self.extraneous(dest);
        }

        self.finish()
    }

    /// Source records that may be planned, keyed for the destination.
    fn eligible_sources<'s>(&mut self, source: &'s Snapshot) -> BTreeMap<String, &'s FileRecord> {
        let mut by_key: BTreeMap<String, Vec<&FileRecord>> = BTreeMap::new();
        for record in source.iter() {
            by_key.entry(self.key(&record.path)).or_default().push(record);
        }

        let mut eligible = BTreeMap::new();
        // BTreeMap order visits parents before children, so exclusions of a
        // directory are known before its descendants are checked.
        let mut ordered: Vec<(String, Vec<&FileRecord>)> = by_key.into_iter().collect();
        ordered.sort_by(|(_, a), (_, b)| {
            let pa = a.first().map(|r| (r.path.depth(), &r.path));
            let pb = b.first().map(|r| (r.path.depth(), &r.path));
            pa.cmp(&pb)
        });
        for (key, records) in ordered {
            let Some(first) = records.first() else {
                continue;
            };
            if self.is_excluded(&first.path) {
                continue;
            }
            if records.len() > 1 {
                self.issues.push(PlanIssue::CaseCollision {
                    paths: records.iter().map(|r| r.path.clone()).collect(),
                });
                self.excluded.insert(key);
                continue;
            }
            if let Err(reason) = leaf_representable(&first.path, self.caps) {
                self.issues.push(PlanIssue::Unrepresentable {
                    path: first.path.clone(),
                    reason,
                });
                self.excluded.insert(key);
                continue;
            }
            if matches!(first.kind, EntryKind::Symlink { .. }) && !self.caps.symlinks {
                self.issues.push(PlanIssue::UnsupportedSymlink {
                    path: first.path.clone(),
                });
                self.excluded.insert(key);
                continue;
            }
            eligible.insert(key, *first);
        }
        eligible
    }

    fn compare(&mut self, src: &FileRecord, dest: &FileRecord) {
        if src.same_content(dest) {
            self.permissions(src, dest);
            return;
        }
        if self.is_conflict(&src.path, Some(src), Some(dest)) {
            self.conflict(&src.path, Some(src), Some(dest));
            return;
        }
        match (&src.kind, &dest.kind) {
            (EntryKind::File, EntryKind::File) => {
                let permissions = src.permissions.translate(
                    self.caps.permissions,
                    Some(dest.permissions),
                    false,
                );
                self.creates.push(SyncOp {
                    path: dest.path.clone(),
                    action: Action::UpdateFile {
                        source: src.clone(),
                        permissions,
                    },
                    expected: Precondition::of(Some(dest)),
                });
            }
            (EntryKind::Symlink { target }, EntryKind::Symlink { .. }) => {
                self.creates.push(SyncOp {
                    path: dest.path.clone(),
                    action: Action::CreateSymlink {
                        target: target.clone(),
                    },
                    expected: Precondition::of(Some(dest)),
                });
            }
            _ => self.replace(src, dest),
        }
    }

    /// Kind changed: delete the destination entry, then create the source's.
    fn replace(&mut self, src: &FileRecord, dest: &FileRecord) {
        if dest.kind.is_dir() && !self.options.delete_extraneous {
            self.issues.push(PlanIssue::Blocked {
                path: dest.path.clone(),
                reason: format!(
                    "replacing a directory with a {} requires deletion",
                    src.kind.as_str()
                ),
            });
            let key = self.key(&dest.path);
            self.excluded.insert(key);
            return;
        }
        self.deletes.push(delete_op(dest));
        self.create(src);
    }

    fn create(&mut self, src: &FileRecord) {
        let expected = Precondition::Absent;
        match &src.kind {
            EntryKind::Dir => {
                let permissions = src
                    .permissions
                    .translate(self.caps.permissions, None, true);
                if permissions.owner_writable() {
                    self.creates.push(SyncOp {
                        path: src.path.clone(),
                        action: Action::CreateDir { permissions },
                        expected,
                    });
                } else {
                    self.creates.push(SyncOp {
                        path: src.path.clone(),
                        action: Action::CreateDir {
                            permissions: permissions.with_owner_write(),
                        },
                        expected,
                    });
                    self.deferred.push(SyncOp {
                        path: src.path.clone(),
                        action: Action::SetPermissions { permissions },
                        expected: Precondition::Dir,
                    });
                }
            }
            EntryKind::File => {
                let permissions = src
                    .permissions
                    .translate(self.caps.permissions, None, false);
                self.creates.push(SyncOp {
                    path: src.path.clone(),
                    action: Action::CreateFile {
                        source: src.clone(),
                        permissions,
                    },
                    expected,
                });
            }
            EntryKind::Symlink { target } => {
                self.creates.push(SyncOp {
                    path: src.path.clone(),
                    action: Action::CreateSymlink {
                        target: target.clone(),
                    },
                    expected,
                });
            }
        }
    }

    /// Same content: only permissions may differ.
    fn permissions(&mut self, src: &FileRecord, dest: &FileRecord) {
        if matches!(src.kind, EntryKind::Symlink { .. }) {
            return;
        }
        let is_dir = src.kind.is_dir();
        let wanted = src
            .permissions
            .translate(self.caps.permissions, Some(dest.permissions), is_dir);
        if wanted == dest.permissions {
            return;
        }
        let op = SyncOp {
            path: dest.path.clone(),
            action: Action::SetPermissions {
                permissions: wanted,
            },
            expected: Precondition::of(Some(dest)),
        };
        if is_dir && !wanted.owner_writable() {
            self.deferred.push(op);
        } else {
            self.creates.push(op);
        }
    }

    fn extraneous(&mut self, dest: &FileRecord) {
        if !self.options.delete_extraneous || self.is_excluded(&dest.path) {
            return;
        }
        if self.is_conflict(&dest.path, None, Some(dest)) {
            self.conflict(&dest.path, None, Some(dest));
            return;
        }
        self.deletes.push(delete_op(dest));
    }

    /// Both sides changed since the base state, and overwriting is off.
    fn is_conflict(
        &self,
        path: &RelPath,
        src: Option<&FileRecord>,
        dest: Option<&FileRecord>,
    ) -> bool {
        if self.options.overwrite_conflicts {
            return false;
        }
        let Some(base) = self.base else {
            return false;
        };
        let known = base.get(path);
        let changed = |record: Option<&FileRecord>| match (known, record) {
            (None, None) => false,
            (Some(fingerprint), Some(record)) => !fingerprint.matches(record),
            _ => true,
        };
        changed(src) && changed(dest)
    }

    fn conflict(&mut self, path: &RelPath, src: Option<&FileRecord>, dest: Option<&FileRecord>) {
        self.issues.push(PlanIssue::Conflict {
            path: path.clone(),
            source: src.cloned(),
            destination: dest.cloned(),
        });
        // Leave whatever is below a conflicting entry alone.
        if src.is_some_and(|r| r.kind.is_dir()) || dest.is_some_and(|r| r.kind.is_dir()) {
            let key = self.key(path);
            self.excluded.insert(key);
        }
    }

    fn finish(mut self) -> SyncPlan {
        // Deletes of descendants of an excluded subtree are dropped late,
        // since exclusions can be discovered after the deletes are queued.
        let deletes = std::mem::take(&mut self.deletes);
        let mut deletes: Vec<SyncOp> = deletes
            .into_iter()
            .filter(|op| !self.is_excluded_below(&op.path))
            .collect();
        deletes.sort_by(deepest_first);
        self.creates.sort_by(shallowest_first);
        self.deferred.sort_by(deepest_first);

        let mut ops = deletes;
        ops.append(&mut self.creates);
        ops.append(&mut self.deferred);
        SyncPlan {
            direction: self.options.direction,
            case_sensitive: self.caps.case_sensitive,
            ops,
            issues: self.issues,
        }
    }

    fn is_excluded_below(&self, path: &RelPath) -> bool {
        path.ancestors()
            .iter()
            .any(|a| self.excluded.contains(&self.key(a)))
    }
}

fn deepest_first(a: &SyncOp, b: &SyncOp) -> std::cmp::Ordering {
    (Reverse(a.path.depth()), &a.path).cmp(&(Reverse(b.path.depth()), &b.path))
}

fn shallowest_first(a: &SyncOp, b: &SyncOp) -> std::cmp::Ordering {
    (a.path.depth(), &a.path).cmp(&(b.path.depth(), &b.path))
}

fn delete_op(dest: &FileRecord) -> SyncOp {
    SyncOp {
        path: dest.path.clone(),
        action: Action::Delete {
            kind: dest.kind.clone(),
        },
        expected: Precondition::of(Some(dest)),
    }
}

/// Ancestors were checked when they were planned, so only the last
/// component needs checking.
fn leaf_representable(path: &RelPath, caps: &Capabilities) -> Result<(), String> {
    match RelPath::new(path.file_name()) {
        Ok(leaf) => leaf.check_representable(caps.name_rules),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
