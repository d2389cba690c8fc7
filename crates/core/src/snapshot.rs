// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Directory snapshots.
//!
//! A [`Snapshot`] is the set of [`FileRecord`]s under a sync root, keyed by
//! relative path. Snapshots are read-only inputs to planning; nothing in the
//! engine assumes the tree stays as scanned.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endpoint::PermissionModel;
use crate::error::{Error, Result};
use crate::filter::FilterSet;
use crate::path::{normalize_link_target, RelPath};
use crate::record::{ContentHash, EntryKind, FileRecord, Permissions};

/// What to do with symbolic links found while scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymlinkPolicy {
    /// Record whatever the link points at, as if it were there.
    Follow,
    /// Leave links out of the snapshot.
    #[default]
    Skip,
    /// Record the link itself so it can be recreated as a link.
    Preserve,
}

impl SymlinkPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymlinkPolicy::Follow => "follow",
            SymlinkPolicy::Skip => "skip",
            SymlinkPolicy::Preserve => "preserve",
        }
    }
}

impl fmt::Display for SymlinkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SymlinkPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "follow" => Ok(SymlinkPolicy::Follow),
            "skip" => Ok(SymlinkPolicy::Skip),
            "preserve" => Ok(SymlinkPolicy::Preserve),
            _ => Err(format!(
                "invalid symlink policy: '{}' (expected follow, skip or preserve)",
                s
            )),
        }
    }
}

/// Options controlling a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub filters: FilterSet,
    pub symlinks: SymlinkPolicy,
    /// Permission model the records are expressed in.
    pub permissions: PermissionModel,
}

impl ScanOptions {
    pub fn new(permissions: PermissionModel) -> Self {
        ScanOptions {
            filters: FilterSet::default(),
            symlinks: SymlinkPolicy::default(),
            permissions,
        }
    }
}

/// The records of one tree, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<RelPath, FileRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from records; later duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();
        Snapshot { entries }
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.entries.insert(record.path.clone(), record);
    }

    pub fn remove(&mut self, path: &RelPath) -> Option<FileRecord> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &RelPath) -> Option<&FileRecord> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.entries.values()
    }

    pub fn into_records(self) -> Vec<FileRecord> {
        self.entries.into_values().collect()
    }
}

/// What a sync root is, following a final symlink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    #[default]
    Missing,
    Dir,
    /// A file, or anything else that is not a directory.
    File,
}

impl RootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootKind::Missing => "missing",
            RootKind::Dir => "directory",
            RootKind::File => "file",
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reports what `root` is. A dangling symlink counts as a file.
pub fn root_kind(root: &Path) -> Result<RootKind> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(RootKind::Dir),
        Ok(_) => Ok(RootKind::File),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => match fs::symlink_metadata(root) {
            Ok(_) => Ok(RootKind::File),
            Err(_) => Ok(RootKind::Missing),
        },
        Err(e) => Err(e.into()),
    }
}

/// Scans the tree under `root`.
///
/// Fails with [`Error::RootNotFound`] when `root` does not exist.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Snapshot> {
    match root_kind(root)? {
        RootKind::Dir => {}
        RootKind::Missing => return Err(Error::RootNotFound(root.display().to_string())),
        RootKind::File => {
            return Err(Error::invalid_path(
                root.display().to_string(),
                "sync root is not a directory",
            ))
        }
    }

    let mut snapshot = Snapshot::new();
    let pending = vec![PendingDir {
        native: root.to_path_buf(),
        rel: None,
        ancestors: canonical_chain(&[], root, options),
    }];
    walk(pending, options, &mut snapshot)?;
    debug!("scanned {}: {} entries", root.display(), snapshot.len());
    Ok(snapshot)
}

/// Scans `root` as the single entry `name`.
///
/// A file yields one record at `name`; a directory yields `name` and its
/// contents below `name/`; a missing root yields nothing. Filters do not
/// apply, and a symlinked root is followed unless links are preserved.
pub fn scan_named(root: &Path, name: &RelPath, options: &ScanOptions) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    if root_kind(root)? == RootKind::Missing {
        return Ok(snapshot);
    }
    let options = ScanOptions {
        filters: FilterSet::default(),
        ..options.clone()
    };
    let top = ScanOptions {
        symlinks: match options.symlinks {
            SymlinkPolicy::Skip => SymlinkPolicy::Follow,
            other => other,
        },
        ..options.clone()
    };
    let pending = scan_entry(root, name.clone(), &[], &top, &mut snapshot)?;
    walk(pending.into_iter().collect(), &options, &mut snapshot)?;
    debug!("scanned {} as {}: {} entries", root.display(), name, snapshot.len());
    Ok(snapshot)
}

/// Scans a sync root and reports what it was.
///
/// With `entry`, the root is scanned as that single entry. Without it, a
/// directory is scanned as a tree and any other root gives no records.
/// A missing root fails unless `missing_ok`.
pub fn scan_root(
    root: &Path,
    entry: Option<&RelPath>,
    missing_ok: bool,
    options: &ScanOptions,
) -> Result<(RootKind, Snapshot)> {
    let kind = root_kind(root)?;
    let snapshot = match (entry, kind) {
        (_, RootKind::Missing) if !missing_ok => {
            return Err(Error::RootNotFound(root.display().to_string()))
        }
        (Some(name), _) => scan_named(root, name, options)?,
        (None, RootKind::Dir) => scan(root, options)?,
        (None, _) => Snapshot::new(),
    };
    Ok((kind, snapshot))
}

fn walk(mut pending: Vec<PendingDir>, options: &ScanOptions, snapshot: &mut Snapshot) -> Result<()> {
    while let Some(current) = pending.pop() {
        let mut names: Vec<_> = fs::read_dir(&current.native)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        names.sort();

        for name in names {
            let Some(name) = name.to_str().map(str::to_string) else {
                warn!("skipping non UTF-8 name in {}", current.native.display());
                continue;
            };
            let rel = match &current.rel {
                Some(parent) => parent.join(&name)?,
                None => RelPath::new(name.clone())?,
            };
            let native = current.native.join(&name);
            if let Some(next) = scan_entry(&native, rel, &current.ancestors, options, snapshot)? {
                pending.push(next);
            }
        }
    }
    Ok(())
}

struct PendingDir {
    native: PathBuf,
    rel: Option<RelPath>,
    /// Canonical paths of this directory and its parents; only tracked
    /// when following symlinks, where cycles are possible.
    ancestors: Vec<PathBuf>,
}

fn canonical_chain(parents: &[PathBuf], dir: &Path, options: &ScanOptions) -> Vec<PathBuf> {
    if options.symlinks != SymlinkPolicy::Follow {
        return Vec::new();
    }
    let mut chain = parents.to_vec();
    if let Ok(canonical) = fs::canonicalize(dir) {
        chain.push(canonical);
    }
    chain
}

/// Records one entry; returns a directory to descend into, if any.
fn scan_entry(
    native: &Path,
    rel: RelPath,
    ancestors: &[PathBuf],
    options: &ScanOptions,
    snapshot: &mut Snapshot,
) -> Result<Option<PendingDir>> {
    let link_meta = fs::symlink_metadata(native)?;
    let meta = if link_meta.file_type().is_symlink() {
        match options.symlinks {
            SymlinkPolicy::Skip => {
                debug!("skipping symlink {}", rel);
                return Ok(None);
            }
            SymlinkPolicy::Preserve => {
                if !options.filters.is_included(&rel) {
                    return Ok(None);
                }
                let target = fs::read_link(native)?;
                let perms = Permissions::default_for(options.permissions, false);
                snapshot.insert(
                    FileRecord::symlink(rel, normalize_link_target(&target), perms)
                        .with_modified_time(modified_of(&link_meta)),
                );
                return Ok(None);
            }
            SymlinkPolicy::Follow => match fs::metadata(native) {
                Ok(m) => m,
                Err(e) => {
                    warn!("skipping broken symlink {}: {}", rel, e);
                    return Ok(None);
                }
            },
        }
    } else {
        link_meta
    };

    if meta.is_dir() {
        if !options.filters.is_dir_included(&rel) {
            return Ok(None);
        }
        let chain = canonical_chain(ancestors, native, options);
        if chain.len() > ancestors.len() && chain.last().is_some_and(|c| ancestors.contains(c)) {
            warn!("skipping {}: directory cycle through symlink", rel);
            return Ok(None);
        }
        let perms = Permissions::from_metadata(&meta, options.permissions);
        snapshot.insert(
            FileRecord::dir(rel.clone(), perms).with_modified_time(modified_of(&meta)),
        );
        return Ok(Some(PendingDir {
            native: native.to_path_buf(),
            rel: Some(rel),
            ancestors: chain,
        }));
    }

    if !meta.is_file() {
        debug!("skipping special file {}", rel);
        return Ok(None);
    }
    if !options.filters.is_included(&rel) {
        return Ok(None);
    }

    let hash = ContentHash::of_reader(File::open(native)?)?;
    let perms = Permissions::from_metadata(&meta, options.permissions);
    snapshot.insert(
        FileRecord::file(rel, meta.len(), hash, perms).with_modified_time(modified_of(&meta)),
    );
    Ok(None)
}

/// Reads the record for a single entry without following a final symlink.
pub fn stat(native: &Path, rel: &RelPath, model: PermissionModel) -> Result<Option<FileRecord>> {
    let meta = match fs::symlink_metadata(native) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let modified = modified_of(&meta);
    let record = if meta.file_type().is_symlink() {
        let target = fs::read_link(native)?;
        FileRecord::symlink(
            rel.clone(),
            normalize_link_target(&target),
            Permissions::default_for(model, false),
        )
    } else if meta.is_dir() {
        FileRecord::dir(rel.clone(), Permissions::from_metadata(&meta, model))
    } else {
        let hash = ContentHash::of_reader(File::open(native)?)?;
        FileRecord::file(
            rel.clone(),
            meta.len(),
            hash,
            Permissions::from_metadata(&meta, model),
        )
    };
    Ok(Some(record.with_modified_time(modified)))
}

fn modified_of(meta: &fs::Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}

/// True when a record at `path` in `snapshot` is a directory.
pub fn is_dir_in(snapshot: &Snapshot, path: &RelPath) -> bool {
    snapshot
        .get(path)
        .is_some_and(|record| matches!(record.kind, EntryKind::Dir))
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
