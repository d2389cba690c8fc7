// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Streamed answers: snapshots, `ReadFile` and `WriteFile`.

use chrono::{DateTime, Utc};
use tracing::debug;

use cs_core::{
    ContentHash, ContentHasher, EntryKind, Permissions, Precondition, RelPath, SymlinkPolicy,
};
use cs_proto::{
    encode_records, DataStream, Message, RemoteError, RemoteErrorKind, ResponseBody, CHUNK_SIZE,
    SNAPSHOT_BATCH,
};

use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::handler;
use crate::link::Link;

/// A `Snapshot` request.
pub(crate) struct SnapshotRequest {
    pub root: String,
    pub filters: Vec<String>,
    pub symlinks: SymlinkPolicy,
    pub missing_ok: bool,
    pub entry: Option<RelPath>,
}

/// A `WriteFile` request.
pub(crate) struct Upload {
    pub root: String,
    pub path: RelPath,
    pub expected: Precondition,
    pub size: u64,
    pub hash: ContentHash,
    pub permissions: Permissions,
    pub modified: Option<DateTime<Utc>>,
}

fn failed(err: &cs_core::Error) -> ResponseBody {
    ResponseBody::Failed {
        error: RemoteError::from(err),
    }
}

/// Scans a root and streams its records in batches, then reports the total.
pub(crate) async fn send_snapshot(
    link: &Link,
    config: &PeerConfig,
    id: u64,
    request: SnapshotRequest,
) -> Result<ResponseBody> {
    let (kind, snapshot) = match handler::scan_request(config, &request) {
        Ok(scanned) => scanned,
        Err(error) => return Ok(ResponseBody::Failed { error }),
    };
    let records = snapshot.into_records();
    for batch in records.chunks(SNAPSHOT_BATCH) {
        let bytes = match encode_records(batch) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(ResponseBody::Failed {
                    error: RemoteError::new(RemoteErrorKind::Io, e.to_string()),
                })
            }
        };
        link.send(Message::data(id, DataStream::Records, bytes)).await?;
    }
    Ok(ResponseBody::Snapshot {
        entries: records.len() as u64,
        root: kind,
    })
}

/// Streams a file to the client, then reports its size and hash.
pub(crate) async fn send_file(
    link: &Link,
    config: &PeerConfig,
    id: u64,
    root: &str,
    path: &RelPath,
    expected: Option<&ContentHash>,
) -> Result<ResponseBody> {
    let tree = match config.tree(root) {
        Ok(tree) => tree,
        Err(error) => return Ok(ResponseBody::Failed { error }),
    };
    match tree.stat(path) {
        Ok(Some(record)) if record.kind == EntryKind::File => {}
        Ok(_) => {
            return Ok(ResponseBody::Failed {
                error: RemoteError::new(
                    RemoteErrorKind::NotFound,
                    format!("{} is not a regular file", path),
                ),
            })
        }
        Err(e) => return Ok(failed(&e)),
    }

    let mut hasher = ContentHasher::new();
    let mut offset = 0u64;
    loop {
        let chunk = match tree.read_chunk(path, offset, CHUNK_SIZE) {
            Ok(chunk) => chunk,
            Err(e) => return Ok(failed(&e)),
        };
        if chunk.is_empty() {
            break;
        }
        hasher.update(&chunk);
        offset += chunk.len() as u64;
        link.send(Message::data(id, DataStream::File, chunk)).await?;
    }
    let hash = hasher.finish();
    if expected.is_some_and(|expected| *expected != hash) {
        return Ok(failed(&cs_core::Error::ContentChanged {
            path: path.to_string(),
        }));
    }
    debug!("#{} sent {} ({} bytes)", id, path, offset);
    Ok(ResponseBody::FileSent { size: offset, hash })
}

/// Receives the data frames of an upload and commits the file.
///
/// All `size` bytes are consumed even when the write cannot proceed, so the
/// stream stays in step with the client.
pub(crate) async fn receive_file(
    link: &mut Link,
    config: &PeerConfig,
    id: u64,
    upload: Upload,
) -> Result<ResponseBody> {
    let mut failure = None;
    let mut pending = match config.tree(&upload.root) {
        Ok(tree) => match tree.begin_write(&upload.path, &upload.expected) {
            Ok(pending) => Some(pending),
            Err(e) => {
                failure = Some(failed(&e));
                None
            }
        },
        Err(error) => {
            failure = Some(ResponseBody::Failed { error });
            None
        }
    };

    let mut received = 0u64;
    while received < upload.size {
        let chunk = match link.recv().await {
            Some(Message::Data(chunk)) if chunk.id == id && chunk.stream == DataStream::File => {
                chunk
            }
            Some(other) => {
                return Err(PeerError::Protocol(format!(
                    "{} during upload #{}",
                    other.describe(),
                    id
                )))
            }
            None => return Err(PeerError::Closed),
        };
        received += chunk.bytes.len() as u64;
        if received > upload.size {
            return Err(PeerError::Protocol(format!(
                "upload #{} exceeds its announced {} bytes",
                id, upload.size
            )));
        }
        if let Some(writer) = pending.as_mut() {
            if let Err(e) = writer.write(&chunk.bytes) {
                failure = Some(failed(&e));
                pending = None;
            }
        }
    }

    if let Some(failure) = failure {
        return Ok(failure);
    }
    let Some(writer) = pending else {
        return Err(PeerError::Protocol(format!("upload #{} has no writer", id)));
    };
    match writer.commit(&upload.hash, upload.permissions, upload.modified) {
        Ok(record) => {
            debug!("#{} wrote {} ({} bytes)", id, upload.path, received);
            Ok(ResponseBody::Record {
                record: Some(record),
            })
        }
        Err(e) => Ok(failed(&e)),
    }
}
