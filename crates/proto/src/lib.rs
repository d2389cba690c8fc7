// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol shared by the crossync CLI and the cs-peer service.
//!
//! A session is a sequence of frames (see [`frame`]) over one byte stream:
//!
//! 1. the client sends `Hello{version, endpoint}`;
//! 2. the peer answers `Welcome{version, endpoint}` or `Reject{version,
//!    reason}` and closes;
//! 3. the client sends `Request{id, op}` frames one at a time; the peer
//!    answers each with `Response{id, ...}`, possibly preceded by `Data`
//!    frames carrying file content, command output or snapshot records for
//!    that id;
//! 4. either side may send `Goodbye` and close.
//!
//! `WriteFile` is the one request followed by client-sent `Data` frames.
//! `Cancel{id}` may be sent while an `Exec` is running.

pub mod frame;
pub mod message;

pub use frame::{
    read_frame, read_frame_async, write_frame, write_frame_async, Frame, FrameDecoder, FrameError,
    FrameTag, MAX_FRAME_SIZE,
};
pub use message::{
    decode_records, encode_records, Cancel, DataChunk, DataStream, Hello, Message, ProtocolError, Reject, RemoteError,
    RemoteErrorKind, Request, RequestOp, Response, ResponseBody, Welcome,
};

/// Version spoken by this build. Only an exact match is compatible.
pub const PROTOCOL_VERSION: u32 = 1;

/// Payload size of file data frames.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Records per snapshot batch. Paths are bounded by the file systems, so a
/// batch stays far below [`MAX_FRAME_SIZE`].
pub const SNAPSHOT_BATCH: usize = 512;

/// Default TCP port of the peer.
pub const DEFAULT_PORT: u16 = 7711;

/// Checks a version announced by the other side.
///
/// There is no partial-compatibility mode: anything but an exact match is
/// refused with a description of both versions.
pub fn check_version(theirs: u32) -> Result<(), String> {
    if theirs == PROTOCOL_VERSION {
        Ok(())
    } else {
        Err(format!(
            "protocol version mismatch: local {}, remote {}",
            PROTOCOL_VERSION, theirs
        ))
    }
}

/// Writes a message to an async writer.
pub async fn send_message<W>(writer: &mut W, message: &Message) -> Result<(), FrameError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    write_frame_async(writer, &message.to_frame()?).await
}

/// Reads the next message from an async reader.
///
/// Frames with unknown tags come back as [`FrameError::UnknownTag`] after
/// being consumed whole, so the caller may log and keep reading.
pub async fn recv_message<R>(reader: &mut R) -> Result<Message, FrameError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let frame = read_frame_async(reader).await?;
    Message::from_frame(&frame)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
