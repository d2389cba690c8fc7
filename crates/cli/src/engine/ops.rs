// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Carrying out single plan operations.
//!
//! Every operation re-checks what it relies on right before acting: the
//! destination precondition is checked by whichever side owns the
//! destination, and file sources are re-hashed (locally) or read with an
//! expected hash (remotely).

use std::time::Duration;

use tracing::{debug, warn};

use cs_core::{
    Action, ContentHash, Direction, FileRecord, LocalTree, Permissions, Precondition, RelPath,
    Side, SyncOp,
};
use cs_proto::{DataStream, RequestOp, ResponseBody, CHUNK_SIZE};

use super::report::SyncError;
use crate::session::{Reply, Session, SessionError};

/// What every operation of one run shares.
#[derive(Debug)]
pub(crate) struct OpContext {
    pub direction: Direction,
    pub local: LocalTree,
    pub remote_root: String,
    /// Plan path and source path of a single entry synced under another
    /// name.
    pub rename: Option<(RelPath, RelPath)>,
    pub request_timeout: Duration,
}

impl OpContext {
    /// Where the source side keeps the entry planned at `path`.
    fn source_path<'a>(&'a self, path: &'a RelPath) -> &'a RelPath {
        match &self.rename {
            Some((planned, source)) if planned == path => source,
            _ => path,
        }
    }

    /// Carries out `op`; returns the number of content bytes transferred.
    pub(crate) async fn execute(&self, session: &mut Session, op: &SyncOp) -> Result<u64, SyncError> {
        debug!("{} on {}", op, self.direction.destination());
        match self.direction.destination() {
            Side::Remote => self.push(session, op).await,
            Side::Local => self.pull(session, op).await,
        }
    }

    /// Applies `op` to the peer's tree.
    async fn push(&self, session: &mut Session, op: &SyncOp) -> Result<u64, SyncError> {
        let root = self.remote_root.clone();
        let path = op.path.clone();
        let expected = op.expected.clone();
        let request = match &op.action {
            Action::CreateFile {
                source,
                permissions,
            }
            | Action::UpdateFile {
                source,
                permissions,
            } => return self.upload(session, op, source, *permissions).await,
            Action::CreateDir { permissions } => RequestOp::CreateDir {
                root,
                path,
                permissions: *permissions,
                expected,
            },
            Action::CreateSymlink { target } => RequestOp::CreateSymlink {
                root,
                path,
                target: target.clone(),
                expected,
            },
            Action::Delete { .. } => RequestOp::Remove {
                root,
                path,
                expected,
            },
            Action::SetPermissions { permissions } => RequestOp::SetPermissions {
                root,
                path,
                permissions: *permissions,
                expected,
            },
        };
        session
            .request(request)
            .await
            .map(|_| 0)
            .map_err(SyncError::session)
    }

    async fn upload(
        &self,
        session: &mut Session,
        op: &SyncOp,
        source: &FileRecord,
        permissions: Permissions,
    ) -> Result<u64, SyncError> {
        let hash = source_hash(source)?;
        let source_path = self.source_path(&source.path);
        self.local
            .check(source_path, &Precondition::File { hash: hash.clone() })
            .map_err(|e| match e {
                cs_core::Error::PreconditionFailed { .. } => SyncError::SourceChanged,
                other => SyncError::local(other),
            })?;

        let id = session
            .begin(RequestOp::WriteFile {
                root: self.remote_root.clone(),
                path: op.path.clone(),
                expected: op.expected.clone(),
                size: source.size,
                hash: hash.clone(),
                permissions,
                modified: source.modified,
            })
            .await?;

        // Exactly `size` bytes must follow the request. If the file changed
        // underneath us the padding makes the peer's hash check fail.
        let mut offset = 0u64;
        while offset < source.size {
            let want = (source.size - offset).min(CHUNK_SIZE as u64) as usize;
            let mut chunk = match self.local.read_chunk(source_path, offset, want) {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("reading {} failed: {}", source_path, e);
                    Vec::new()
                }
            };
            chunk.resize(want, 0);
            session.send_data(id, chunk).await?;
            offset += want as u64;
        }

        match session.next_reply(id, Some(self.request_timeout)).await? {
            Reply::Done(ResponseBody::Record { .. }) => Ok(source.size),
            Reply::Done(ResponseBody::Failed { error }) => Err(SyncError::remote(error)),
            other => Err(unexpected("write_file", &other)),
        }
    }

    /// Applies `op` to the local tree.
    async fn pull(&self, session: &mut Session, op: &SyncOp) -> Result<u64, SyncError> {
        let tree = &self.local;
        let result = match &op.action {
            Action::CreateFile {
                source,
                permissions,
            }
            | Action::UpdateFile {
                source,
                permissions,
            } => return self.download(session, op, source, *permissions).await,
            Action::CreateDir { permissions } => {
                tree.create_dir(&op.path, *permissions, &op.expected).map(|_| ())
            }
            Action::CreateSymlink { target } => {
                tree.create_symlink(&op.path, target, &op.expected).map(|_| ())
            }
            Action::Delete { .. } => tree.remove(&op.path, &op.expected),
            Action::SetPermissions { permissions } => tree
                .set_permissions(&op.path, *permissions, &op.expected)
                .map(|_| ()),
        };
        result.map(|()| 0).map_err(SyncError::local)
    }

    async fn download(
        &self,
        session: &mut Session,
        op: &SyncOp,
        source: &FileRecord,
        permissions: Permissions,
    ) -> Result<u64, SyncError> {
        let hash = source_hash(source)?;
        let mut pending = self
            .local
            .begin_write(&op.path, &op.expected)
            .map_err(SyncError::local)?;

        let id = session
            .begin(RequestOp::ReadFile {
                root: self.remote_root.clone(),
                path: self.source_path(&source.path).clone(),
                expected: Some(hash.clone()),
            })
            .await?;

        // Keep reading after a local write error so the session stays in
        // step with the peer.
        let mut write_error = None;
        loop {
            match session.next_reply(id, Some(self.request_timeout)).await? {
                Reply::Data(DataStream::File, bytes) => {
                    if write_error.is_none() {
                        if let Err(e) = pending.write(&bytes) {
                            write_error = Some(e);
                        }
                    }
                }
                Reply::Data(stream, bytes) => {
                    warn!("ignoring {} {:?} bytes for #{}", bytes.len(), stream, id);
                }
                Reply::Done(ResponseBody::FileSent { size, .. }) => {
                    if let Some(e) = write_error {
                        return Err(SyncError::local(e));
                    }
                    pending
                        .commit(&hash, permissions, source.modified)
                        .map_err(SyncError::local)?;
                    return Ok(size);
                }
                Reply::Done(ResponseBody::Failed { error }) => return Err(SyncError::remote(error)),
                other => return Err(unexpected("read_file", &other)),
            }
        }
    }
}

fn source_hash(source: &FileRecord) -> Result<ContentHash, SyncError> {
    source.hash.clone().ok_or(SyncError::SourceChanged)
}

fn unexpected(op: &str, reply: &Reply) -> SyncError {
    SyncError::Session(SessionError::Protocol(format!(
        "unexpected answer to {}: {:?}",
        op, reply
    )))
}
