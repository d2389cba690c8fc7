// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mutations of a tree on the local filesystem.
//!
//! Every mutation takes a [`Precondition`] describing what the caller
//! believes is at the path, and re-checks it immediately before acting.
//! A mismatch fails the single operation with
//! [`Error::PreconditionFailed`] and leaves the tree untouched.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endpoint::{Capabilities, PermissionModel};
use crate::error::{Error, Result};
use crate::path::RelPath;
use crate::record::{ContentHash, ContentHasher, EntryKind, FileRecord, Permissions};
use crate::snapshot::{self, RootKind};

/// Suffix of in-flight temporary files.
pub const TEMP_SUFFIX: &str = ".crossync-tmp";

/// What an operation expects to find at its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Precondition {
    /// Anything, including nothing.
    Any,
    Absent,
    File { hash: ContentHash },
    Dir,
    Symlink { target: String },
}

impl Precondition {
    /// The precondition satisfied exactly by `record`.
    pub fn of(record: Option<&FileRecord>) -> Self {
        match record {
            None => Precondition::Absent,
            Some(record) => match (&record.kind, &record.hash) {
                (EntryKind::File, Some(hash)) => Precondition::File { hash: hash.clone() },
                (EntryKind::File, None) => Precondition::Any,
                (EntryKind::Dir, _) => Precondition::Dir,
                (EntryKind::Symlink { target }, _) => Precondition::Symlink {
                    target: target.clone(),
                },
            },
        }
    }

    /// Checks `actual` against this precondition.
    pub fn check(&self, path: &RelPath, actual: Option<&FileRecord>) -> Result<()> {
        let ok = match (self, actual) {
            (Precondition::Any, _) => true,
            (Precondition::Absent, None) => true,
            (Precondition::File { hash }, Some(record)) => {
                record.kind == EntryKind::File && record.hash.as_ref() == Some(hash)
            }
            (Precondition::Dir, Some(record)) => record.kind == EntryKind::Dir,
            (Precondition::Symlink { target }, Some(record)) => {
                matches!(&record.kind, EntryKind::Symlink { target: t } if t == target)
            }
            _ => false,
        };
        if ok {
            return Ok(());
        }
        Err(Error::PreconditionFailed {
            path: path.to_string(),
            reason: format!("expected {}, found {}", self.describe(), describe(actual)),
        })
    }

    fn describe(&self) -> String {
        match self {
            Precondition::Any => "anything".to_string(),
            Precondition::Absent => "nothing".to_string(),
            Precondition::File { hash } => format!("file {:?}", hash),
            Precondition::Dir => "directory".to_string(),
            Precondition::Symlink { target } => format!("symlink to {}", target),
        }
    }
}

fn describe(record: Option<&FileRecord>) -> String {
    match record {
        None => "nothing".to_string(),
        Some(record) => match &record.kind {
            EntryKind::File => match &record.hash {
                Some(hash) => format!("file {:?}", hash),
                None => "file".to_string(),
            },
            EntryKind::Dir => "directory".to_string(),
            EntryKind::Symlink { target } => format!("symlink to {}", target),
        },
    }
}

/// A sync root on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
    model: PermissionModel,
    symlinks: bool,
}

impl LocalTree {
    pub fn new(root: impl Into<PathBuf>, capabilities: &Capabilities) -> Self {
        LocalTree {
            root: root.into(),
            model: capabilities.permissions,
            symlinks: capabilities.symlinks,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn permission_model(&self) -> PermissionModel {
        self.model
    }

    /// Native path of `path` under the root.
    pub fn native(&self, path: &RelPath) -> PathBuf {
        path.to_native(&self.root)
    }

    /// Creates the root directory (and parents) if missing.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Removes whatever non-directory sits at the root, then creates the
    /// root directory.
    pub fn replace_root(&self) -> Result<()> {
        if snapshot::root_kind(&self.root)? == RootKind::File {
            let meta = fs::symlink_metadata(&self.root)?;
            if meta.file_type().is_symlink() {
                remove_symlink(&self.root)?;
            } else {
                let permissions = Permissions::from_metadata(&meta, self.model);
                if !permissions.owner_writable() {
                    apply_permissions(&self.root, permissions.with_owner_write())?;
                }
                fs::remove_file(&self.root)?;
            }
            debug!("removed non-directory root {}", self.root.display());
        }
        self.ensure_root()
    }

    pub fn stat(&self, path: &RelPath) -> Result<Option<FileRecord>> {
        snapshot::stat(&self.native(path), path, self.model)
    }

    /// Stats `path` and checks it against `expected`.
    pub fn check(&self, path: &RelPath, expected: &Precondition) -> Result<Option<FileRecord>> {
        if *expected == Precondition::Any {
            return self.stat(path);
        }
        let actual = self.stat(path)?;
        expected.check(path, actual.as_ref())?;
        Ok(actual)
    }

    /// Reads up to `len` bytes of a file starting at `offset`.
    pub fn read_chunk(&self, path: &RelPath, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = File::open(self.native(path))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Starts writing a file. Content goes to a temporary sibling and only
    /// replaces `path` on [`PendingWrite::commit`].
    pub fn begin_write(&self, path: &RelPath, expected: &Precondition) -> Result<PendingWrite> {
        self.check(path, expected)?;
        let final_path = self.native(path);
        let parent = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        if !parent.is_dir() {
            return Err(Error::PreconditionFailed {
                path: path.to_string(),
                reason: "parent directory does not exist".to_string(),
            });
        }
        let tmp_path = parent.join(format!(".{}{}", path.file_name(), TEMP_SUFFIX));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        debug!("writing {} via {}", path, tmp_path.display());
        Ok(PendingWrite {
            tree: self.clone(),
            path: path.clone(),
            expected: expected.clone(),
            final_path,
            tmp_path,
            file: Some(file),
            hasher: Some(ContentHasher::new()),
            written: 0,
        })
    }

    /// Creates a directory. An existing directory satisfies the request.
    pub fn create_dir(
        &self,
        path: &RelPath,
        permissions: Permissions,
        expected: &Precondition,
    ) -> Result<FileRecord> {
        let existing = self.check(path, expected)?;
        let native = self.native(path);
        match existing {
            Some(record) if record.kind == EntryKind::Dir => {}
            Some(_) => {
                return Err(Error::PreconditionFailed {
                    path: path.to_string(),
                    reason: "a non-directory is in the way".to_string(),
                });
            }
            None => fs::create_dir(&native)?,
        }
        apply_permissions(&native, permissions)?;
        self.stat_existing(path)
    }

    /// Creates a symbolic link pointing at `target` (forward slashes).
    pub fn create_symlink(
        &self,
        path: &RelPath,
        target: &str,
        expected: &Precondition,
    ) -> Result<FileRecord> {
        if !self.symlinks {
            return Err(Error::Unsupported(format!("symlink {}", path)));
        }
        if let Some(existing) = self.check(path, expected)? {
            self.remove_native(path, &existing)?;
        }
        make_symlink(target, &self.native(path))?;
        self.stat_existing(path)
    }

    /// Removes a file, symlink or empty directory.
    pub fn remove(&self, path: &RelPath, expected: &Precondition) -> Result<()> {
        match self.check(path, expected)? {
            Some(existing) => self.remove_native(path, &existing),
            None => Ok(()),
        }
    }

    /// Replaces the permissions of an existing entry.
    pub fn set_permissions(
        &self,
        path: &RelPath,
        permissions: Permissions,
        expected: &Precondition,
    ) -> Result<FileRecord> {
        let existing = self.check(path, expected)?;
        if existing.is_none() {
            return Err(Error::PreconditionFailed {
                path: path.to_string(),
                reason: "nothing to set permissions on".to_string(),
            });
        }
        apply_permissions(&self.native(path), permissions)?;
        self.stat_existing(path)
    }

    fn remove_native(&self, path: &RelPath, existing: &FileRecord) -> Result<()> {
        let native = self.native(path);
        match existing.kind {
            EntryKind::Dir => fs::remove_dir(&native)?,
            EntryKind::File => {
                if !existing.permissions.owner_writable() {
                    apply_permissions(&native, existing.permissions.with_owner_write())?;
                }
                fs::remove_file(&native)?;
            }
            EntryKind::Symlink { .. } => remove_symlink(&native)?,
        }
        debug!("removed {} {}", existing.kind.as_str(), path);
        Ok(())
    }

    fn stat_existing(&self, path: &RelPath) -> Result<FileRecord> {
        self.stat(path)?.ok_or_else(|| Error::PreconditionFailed {
            path: path.to_string(),
            reason: "entry vanished after it was written".to_string(),
        })
    }
}

/// An in-progress file write; dropped writes remove their temporary file.
#[derive(Debug)]
pub struct PendingWrite {
    tree: LocalTree,
    path: RelPath,
    expected: Precondition,
    final_path: PathBuf,
    tmp_path: PathBuf,
    file: Option<File>,
    hasher: Option<ContentHasher>,
    written: u64,
}

impl PendingWrite {
    pub fn path(&self) -> &RelPath {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let (Some(file), Some(hasher)) = (self.file.as_mut(), self.hasher.as_mut()) else {
            return Err(Error::Unsupported("write after commit".to_string()));
        };
        file.write_all(data)?;
        hasher.update(data);
        self.written += data.len() as u64;
        Ok(())
    }

    /// Verifies the content hash, re-checks the precondition and moves the
    /// file into place.
    pub fn commit(
        mut self,
        expected_hash: &ContentHash,
        permissions: Permissions,
        modified: Option<DateTime<Utc>>,
    ) -> Result<FileRecord> {
        let (Some(file), Some(hasher)) = (self.file.take(), self.hasher.take()) else {
            return Err(Error::Unsupported("commit called twice".to_string()));
        };
        if hasher.finish() != *expected_hash {
            return Err(Error::ContentChanged {
                path: self.path.to_string(),
            });
        }
        if let Some(modified) = modified {
            file.set_modified(SystemTime::from(modified))?;
        }
        file.sync_all()?;
        drop(file);

        let existing = self.tree.check(&self.path, &self.expected)?;
        if let Some(existing) = existing {
            match existing.kind {
                EntryKind::File if !existing.permissions.owner_writable() => {
                    apply_permissions(&self.final_path, existing.permissions.with_owner_write())?;
                }
                EntryKind::File => {}
                _ => self.tree.remove_native(&self.path, &existing)?,
            }
        }
        fs::rename(&self.tmp_path, &self.final_path)?;
        apply_permissions(&self.final_path, permissions)?;
        self.tree.stat_existing(&self.path)
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        self.file.take();
        if self.tmp_path.exists() {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                warn!("failed to remove {}: {}", self.tmp_path.display(), e);
            }
        }
    }
}

fn apply_permissions(native: &Path, permissions: Permissions) -> Result<()> {
    let mut perms = fs::symlink_metadata(native)?.permissions();
    permissions.apply_to(&mut perms);
    fs::set_permissions(native, perms)?;
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(_target: &str, link: &Path) -> Result<()> {
    Err(Error::Unsupported(format!("symlink {}", link.display())))
}

fn remove_symlink(native: &Path) -> Result<()> {
    match fs::remove_file(native) {
        Ok(()) => Ok(()),
        // Directory links on Windows are removed as directories.
        Err(_) if cfg!(windows) => Ok(fs::remove_dir(native)?),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
