// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! File records: the metadata compared when planning a sync.
//!
//! The content hash is the only authority for "same content". Modification
//! times are carried for display and are never used to decide whether two
//! files differ, since clocks on two machines cannot be trusted to agree.

use std::fmt;
use std::fs::Metadata;
use std::io::Read;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::endpoint::PermissionModel;
use crate::error::{Error, Result};
use crate::path::RelPath;

/// Mode bits that are ever transferred; setuid, setgid and sticky never are.
const MODE_MASK: u32 = 0o777;
/// Write bits for user, group and other.
const WRITE_BITS: u32 = 0o222;
/// Owner write bit.
const OWNER_WRITE: u32 = 0o200;
const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

/// SHA-256 of a file's contents, hex encoded.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(data);
        hasher.finish()
    }

    /// Hashes everything readable from `reader`.
    pub fn of_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = ContentHasher::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(buf.get(..n).unwrap_or_default());
        }
        Ok(hasher.finish())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidHash(value));
        }
        Ok(ContentHash(value.to_ascii_lowercase()))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps plan dumps readable.
        write!(f, "#{}", self.0.get(..12).unwrap_or(&self.0))
    }
}

/// Incremental hasher for content that arrives in chunks.
pub struct ContentHasher(Sha256);

impl ContentHasher {
    pub fn new() -> Self {
        ContentHasher(Sha256::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finish(self) -> ContentHash {
        ContentHash(hex::encode(self.0.finalize()))
    }
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentHasher")
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Permission information in the model of the endpoint that reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Permissions {
    /// Unix rwx bits (masked to `0o777`).
    Mode { mode: u32 },
    /// Windows-style read-only attribute.
    ReadOnly { read_only: bool },
}

impl Permissions {
    /// Unix mode permissions with special bits stripped.
    pub fn mode(mode: u32) -> Self {
        Permissions::Mode {
            mode: mode & MODE_MASK,
        }
    }

    /// Read-only flag permissions.
    pub fn read_only(read_only: bool) -> Self {
        Permissions::ReadOnly { read_only }
    }

    /// Default permissions for a new entry under `model`.
    pub fn default_for(model: PermissionModel, is_dir: bool) -> Self {
        match model {
            PermissionModel::UnixMode if is_dir => Permissions::mode(DEFAULT_DIR_MODE),
            PermissionModel::UnixMode => Permissions::mode(DEFAULT_FILE_MODE),
            PermissionModel::ReadOnlyFlag => Permissions::read_only(false),
        }
    }

    /// Reads permissions from native metadata, expressed in `model`.
    pub fn from_metadata(meta: &Metadata, model: PermissionModel) -> Self {
        let native = native_permissions(meta);
        native.translate(model, None, meta.is_dir())
    }

    /// Whether the owner may write the entry.
    pub fn owner_writable(&self) -> bool {
        match self {
            Permissions::Mode { mode } => mode & OWNER_WRITE != 0,
            Permissions::ReadOnly { read_only } => !read_only,
        }
    }

    /// Returns a copy with owner write granted.
    pub fn with_owner_write(&self) -> Self {
        match self {
            Permissions::Mode { mode } => Permissions::mode(mode | OWNER_WRITE),
            Permissions::ReadOnly { .. } => Permissions::read_only(false),
        }
    }

    /// Maps these permissions onto another permission model.
    ///
    /// Translation never escalates: special bits are dropped, and when
    /// converting from the coarser read-only model the destination's
    /// existing mode (or the default) is only narrowed, except for owner
    /// write, which follows the source.
    pub fn translate(
        &self,
        model: PermissionModel,
        existing: Option<Permissions>,
        is_dir: bool,
    ) -> Permissions {
        match (self, model) {
            (Permissions::Mode { mode }, PermissionModel::UnixMode) => Permissions::mode(*mode),
            (Permissions::Mode { mode }, PermissionModel::ReadOnlyFlag) => {
                Permissions::read_only(mode & OWNER_WRITE == 0)
            }
            (Permissions::ReadOnly { read_only }, PermissionModel::ReadOnlyFlag) => {
                Permissions::read_only(*read_only)
            }
            (Permissions::ReadOnly { read_only }, PermissionModel::UnixMode) => {
                let base = match existing {
                    Some(Permissions::Mode { mode }) => mode,
                    _ => {
                        if is_dir {
                            DEFAULT_DIR_MODE
                        } else {
                            DEFAULT_FILE_MODE
                        }
                    }
                };
                if *read_only {
                    Permissions::mode(base & !WRITE_BITS)
                } else {
                    Permissions::mode(base | OWNER_WRITE)
                }
            }
        }
    }

    /// Applies these permissions to native `std` permissions.
    pub fn apply_to(&self, perms: &mut std::fs::Permissions) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let current = perms.mode() & MODE_MASK;
            let target = match self {
                Permissions::Mode { mode } => *mode,
                Permissions::ReadOnly { read_only } => {
                    let existing = Permissions::mode(current);
                    match Permissions::read_only(*read_only).translate(
                        PermissionModel::UnixMode,
                        Some(existing),
                        false,
                    ) {
                        Permissions::Mode { mode } => mode,
                        Permissions::ReadOnly { .. } => current,
                    }
                }
            };
            perms.set_mode(target & MODE_MASK);
        }
        #[cfg(not(unix))]
        {
            perms.set_readonly(!self.owner_writable());
        }
    }
}

#[cfg(unix)]
fn native_permissions(meta: &Metadata) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    Permissions::mode(meta.permissions().mode())
}

#[cfg(not(unix))]
fn native_permissions(meta: &Metadata) -> Permissions {
    Permissions::read_only(meta.permissions().readonly())
}

/// What kind of entry a record describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    /// A link recreated as a link; target uses forward slashes.
    Symlink { target: String },
}

impl EntryKind {
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Dir)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
            EntryKind::Symlink { .. } => "symlink",
        }
    }
}

/// Metadata describing one entry of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the sync root.
    pub path: RelPath,
    /// Entry kind.
    #[serde(flatten)]
    pub kind: EntryKind,
    /// Size in bytes (zero for directories).
    pub size: u64,
    /// Last modification time; advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Content hash; present for files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
    /// Permissions in the reporting endpoint's model.
    pub permissions: Permissions,
}

impl FileRecord {
    /// Creates a file record.
    pub fn file(path: RelPath, size: u64, hash: ContentHash, permissions: Permissions) -> Self {
        FileRecord {
            path,
            kind: EntryKind::File,
            size,
            modified: None,
            hash: Some(hash),
            permissions,
        }
    }

    /// Creates a directory record.
    pub fn dir(path: RelPath, permissions: Permissions) -> Self {
        FileRecord {
            path,
            kind: EntryKind::Dir,
            size: 0,
            modified: None,
            hash: None,
            permissions,
        }
    }

    /// Creates a symlink record.
    pub fn symlink(path: RelPath, target: impl Into<String>, permissions: Permissions) -> Self {
        FileRecord {
            path,
            kind: EntryKind::Symlink {
                target: target.into(),
            },
            size: 0,
            modified: None,
            hash: None,
            permissions,
        }
    }

    /// Sets the advisory modification time.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_modified_time(mut self, modified: Option<DateTime<Utc>>) -> Self {
        self.modified = modified;
        self
    }

    /// True when both records describe the same content, ignoring
    /// modification time and permissions.
    pub fn same_content(&self, other: &FileRecord) -> bool {
        match (&self.kind, &other.kind) {
            (EntryKind::File, EntryKind::File) => self.hash.is_some() && self.hash == other.hash,
            (EntryKind::Dir, EntryKind::Dir) => true,
            (EntryKind::Symlink { target: a }, EntryKind::Symlink { target: b }) => a == b,
            _ => false,
        }
    }

    /// True when both records have the same kind of entry.
    pub fn same_kind(&self, other: &FileRecord) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
