// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol messages carried in frames.

use std::fmt;

use chrono::{DateTime, Utc};
use cs_core::{
    ContentHash, Endpoint, FileRecord, Permissions, Precondition, RelPath, RootKind,
    SymlinkPolicy,
};
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameError, FrameTag, Result};

/// Client greeting; the first frame of every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub version: u32,
    pub endpoint: Endpoint,
}

/// Peer acceptance of a [`Hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    pub version: u32,
    pub endpoint: Endpoint,
}

/// Peer refusal of a [`Hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    /// The version the peer speaks.
    pub version: u32,
    pub reason: String,
}

/// A request; the peer answers with a [`Response`] carrying the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub op: RequestOp,
}

/// Operations a peer performs.
///
/// Paths are relative to `root`, which is a native path on the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RequestOp {
    Ping,
    /// Scan a tree; a missing root yields an empty snapshot when
    /// `missing_ok` is set, and a root that is not a directory yields an
    /// empty one. With `entry`, the root is scanned as that single entry
    /// instead. Records come back in batches on [`DataStream::Records`],
    /// then [`ResponseBody::Snapshot`] gives the total and the root kind.
    Snapshot {
        root: String,
        #[serde(default)]
        filters: Vec<String>,
        symlinks: SymlinkPolicy,
        #[serde(default)]
        missing_ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<RelPath>,
    },
    /// Create the root directory if missing; with `replace`, first remove
    /// a non-directory in its place.
    PrepareRoot {
        root: String,
        #[serde(default)]
        replace: bool,
    },
    /// Stream a file back as data frames, then answer
    /// [`ResponseBody::FileSent`]. Fails if the content hash differs from
    /// `expected`.
    ReadFile {
        root: String,
        path: RelPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected: Option<ContentHash>,
    },
    /// Receive `size` bytes as data frames, verify `hash`, then move the
    /// file into place.
    WriteFile {
        root: String,
        path: RelPath,
        expected: Precondition,
        size: u64,
        hash: ContentHash,
        permissions: Permissions,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modified: Option<DateTime<Utc>>,
    },
    CreateDir {
        root: String,
        path: RelPath,
        permissions: Permissions,
        expected: Precondition,
    },
    CreateSymlink {
        root: String,
        path: RelPath,
        target: String,
        expected: Precondition,
    },
    Remove {
        root: String,
        path: RelPath,
        expected: Precondition,
    },
    SetPermissions {
        root: String,
        path: RelPath,
        permissions: Permissions,
        expected: Precondition,
    },
    Stat { root: String, path: RelPath },
    /// Run a program; output arrives as data frames.
    Exec {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

impl RequestOp {
    pub fn name(&self) -> &'static str {
        match self {
            RequestOp::Ping => "ping",
            RequestOp::Snapshot { .. } => "snapshot",
            RequestOp::PrepareRoot { .. } => "prepare_root",
            RequestOp::ReadFile { .. } => "read_file",
            RequestOp::WriteFile { .. } => "write_file",
            RequestOp::CreateDir { .. } => "create_dir",
            RequestOp::CreateSymlink { .. } => "create_symlink",
            RequestOp::Remove { .. } => "remove",
            RequestOp::SetPermissions { .. } => "set_permissions",
            RequestOp::Stat { .. } => "stat",
            RequestOp::Exec { .. } => "exec",
        }
    }
}

/// The answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResponseBody {
    Pong,
    /// All records of a snapshot were sent.
    Snapshot {
        entries: u64,
        #[serde(default)]
        root: RootKind,
    },
    /// The entry after the operation (or as found, for `stat`).
    Record { record: Option<FileRecord> },
    Done,
    FileSent { size: u64, hash: ContentHash },
    /// The command ran to completion or was cancelled.
    Exited {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default)]
        cancelled: bool,
    },
    Failed { error: RemoteError },
}

/// Classification of a failure on the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    PreconditionFailed,
    ContentChanged,
    NotFound,
    Unsupported,
    InvalidRequest,
    SpawnFailed,
    TimedOut,
    Io,
}

/// A failure reported by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        RemoteError {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<&cs_core::Error> for RemoteError {
    fn from(err: &cs_core::Error) -> Self {
        use cs_core::Error as E;
        let kind = match err {
            E::PreconditionFailed { .. } => RemoteErrorKind::PreconditionFailed,
            E::ContentChanged { .. } => RemoteErrorKind::ContentChanged,
            E::RootNotFound(_) => RemoteErrorKind::NotFound,
            E::Io(e) if e.kind() == std::io::ErrorKind::NotFound => RemoteErrorKind::NotFound,
            E::Unsupported(_) => RemoteErrorKind::Unsupported,
            E::InvalidPath { .. }
            | E::PathEscapesRoot(_)
            | E::InvalidFilter(_)
            | E::FilterRegex { .. }
            | E::InvalidHash(_) => RemoteErrorKind::InvalidRequest,
            _ => RemoteErrorKind::Io,
        };
        RemoteError::new(kind, err.to_string())
    }
}

/// Which stream a data frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStream {
    File,
    Stdout,
    Stderr,
    /// A JSON array of snapshot records.
    Records,
}

impl DataStream {
    pub fn as_byte(&self) -> u8 {
        match self {
            DataStream::File => 0,
            DataStream::Stdout => 1,
            DataStream::Stderr => 2,
            DataStream::Records => 3,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(DataStream::File),
            1 => Some(DataStream::Stdout),
            2 => Some(DataStream::Stderr),
            3 => Some(DataStream::Records),
            _ => None,
        }
    }
}

/// A chunk of file content or command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub id: u64,
    pub stream: DataStream,
    pub bytes: Vec<u8>,
}

/// Encodes a batch of snapshot records for a [`DataStream::Records`] chunk.
pub fn encode_records(records: &[FileRecord]) -> Result<Vec<u8>> {
    serde_json::to_vec(records).map_err(|e| FrameError::Malformed {
        tag: FrameTag::Data.as_str(),
        reason: e.to_string(),
    })
}

/// Decodes a [`DataStream::Records`] chunk.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<FileRecord>> {
    serde_json::from_slice(bytes).map_err(|e| FrameError::Malformed {
        tag: FrameTag::Data.as_str(),
        reason: format!("bad record batch: {}", e),
    })
}

/// Asks the peer to stop request `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub id: u64,
}

/// A protocol violation reported before closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    pub message: String,
}

/// Every message of the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Hello),
    Welcome(Welcome),
    Reject(Reject),
    Request(Request),
    Response(Response),
    Data(DataChunk),
    Cancel(Cancel),
    Goodbye,
    Error(ProtocolError),
}

impl Message {
    pub fn tag(&self) -> FrameTag {
        match self {
            Message::Hello(_) => FrameTag::Hello,
            Message::Welcome(_) => FrameTag::Welcome,
            Message::Reject(_) => FrameTag::Reject,
            Message::Request(_) => FrameTag::Request,
            Message::Response(_) => FrameTag::Response,
            Message::Data(_) => FrameTag::Data,
            Message::Cancel(_) => FrameTag::Cancel,
            Message::Goodbye => FrameTag::Goodbye,
            Message::Error(_) => FrameTag::Error,
        }
    }

    pub fn request(id: u64, op: RequestOp) -> Self {
        Message::Request(Request { id, op })
    }

    pub fn response(id: u64, body: ResponseBody) -> Self {
        Message::Response(Response { id, body })
    }

    pub fn failed(id: u64, error: RemoteError) -> Self {
        Message::response(id, ResponseBody::Failed { error })
    }

    pub fn data(id: u64, stream: DataStream, bytes: Vec<u8>) -> Self {
        Message::Data(DataChunk { id, stream, bytes })
    }

    pub fn to_frame(&self) -> Result<Frame> {
        let tag = self.tag();
        match self {
            Message::Hello(m) => Frame::json(tag, m),
            Message::Welcome(m) => Frame::json(tag, m),
            Message::Reject(m) => Frame::json(tag, m),
            Message::Request(m) => Frame::json(tag, m),
            Message::Response(m) => Frame::json(tag, m),
            Message::Data(chunk) => Ok(Frame::data(chunk.id, chunk.stream.as_byte(), &chunk.bytes)),
            Message::Cancel(m) => Frame::json(tag, m),
            Message::Goodbye => Ok(Frame::new(tag, Vec::new())),
            Message::Error(m) => Frame::json(tag, m),
        }
    }

    /// Decodes a frame; unknown tags and bad bodies are recoverable errors.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let tag = frame
            .known_tag()
            .ok_or(FrameError::UnknownTag(frame.tag))?;
        Ok(match tag {
            FrameTag::Hello => Message::Hello(frame.decode_json()?),
            FrameTag::Welcome => Message::Welcome(frame.decode_json()?),
            FrameTag::Reject => Message::Reject(frame.decode_json()?),
            FrameTag::Request => Message::Request(frame.decode_json()?),
            FrameTag::Response => Message::Response(frame.decode_json()?),
            FrameTag::Data => {
                let (id, stream, bytes) = frame.decode_data()?;
                let stream = DataStream::from_byte(stream).ok_or_else(|| FrameError::Malformed {
                    tag: FrameTag::Data.as_str(),
                    reason: format!("unknown stream {}", stream),
                })?;
                Message::data(id, stream, bytes.to_vec())
            }
            FrameTag::Cancel => Message::Cancel(frame.decode_json()?),
            FrameTag::Goodbye => Message::Goodbye,
            FrameTag::Error => Message::Error(frame.decode_json()?),
        })
    }

    /// Short description for logs; never includes payloads.
    pub fn describe(&self) -> String {
        match self {
            Message::Request(r) => format!("request #{} {}", r.id, r.op.name()),
            Message::Response(r) => format!("response #{}", r.id),
            Message::Data(d) => format!("data #{} {} bytes", d.id, d.bytes.len()),
            Message::Cancel(c) => format!("cancel #{}", c.id),
            other => other.tag().as_str().to_string(),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
