// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Frame layer.
//!
//! Frames are laid out as:
//! - 4 bytes: length `N` of everything that follows (big-endian u32)
//! - 1 byte: frame tag
//! - `N - 1` bytes: body
//!
//! Bodies are JSON, except for [`FrameTag::Data`] frames whose body is an
//! 8-byte big-endian request id, a 1-byte stream id and raw bytes. Since the
//! length covers the whole frame, a reader can always skip a frame it does
//! not understand and stay in sync with the stream.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (16 MiB), tag included.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const LEN_SIZE: usize = 4;
const DATA_HEADER_SIZE: usize = 9;

/// Errors of the frame layer.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too large: {len} bytes (max {max})")]
    TooLarge { len: usize, max: usize },

    #[error("empty frame")]
    Empty,

    #[error("unknown frame tag {0}")]
    UnknownTag(u8),

    #[error("malformed {tag} frame: {reason}")]
    Malformed { tag: &'static str, reason: String },

    #[error("stream closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Errors after which the stream can still be read.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::UnknownTag(_) | FrameError::Malformed { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Frame type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameTag {
    Hello = 1,
    Welcome = 2,
    Reject = 3,
    Request = 4,
    Response = 5,
    Data = 6,
    Cancel = 7,
    Goodbye = 8,
    Error = 9,
}

impl FrameTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            1 => FrameTag::Hello,
            2 => FrameTag::Welcome,
            3 => FrameTag::Reject,
            4 => FrameTag::Request,
            5 => FrameTag::Response,
            6 => FrameTag::Data,
            7 => FrameTag::Cancel,
            8 => FrameTag::Goodbye,
            9 => FrameTag::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameTag::Hello => "hello",
            FrameTag::Welcome => "welcome",
            FrameTag::Reject => "reject",
            FrameTag::Request => "request",
            FrameTag::Response => "response",
            FrameTag::Data => "data",
            FrameTag::Cancel => "cancel",
            FrameTag::Goodbye => "goodbye",
            FrameTag::Error => "error",
        }
    }
}

/// One raw frame: a tag byte and an opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(tag: FrameTag, body: Vec<u8>) -> Self {
        Frame {
            tag: tag as u8,
            body,
        }
    }

    /// Builds a frame with a JSON body.
    pub fn json<T: Serialize>(tag: FrameTag, body: &T) -> Result<Self> {
        let body = serde_json::to_vec(body).map_err(|e| FrameError::Malformed {
            tag: tag.as_str(),
            reason: e.to_string(),
        })?;
        Ok(Frame::new(tag, body))
    }

    /// Builds a [`FrameTag::Data`] frame.
    pub fn data(id: u64, stream: u8, bytes: &[u8]) -> Self {
        let mut body = Vec::with_capacity(DATA_HEADER_SIZE + bytes.len());
        body.extend_from_slice(&id.to_be_bytes());
        body.push(stream);
        body.extend_from_slice(bytes);
        Frame::new(FrameTag::Data, body)
    }

    pub fn known_tag(&self) -> Option<FrameTag> {
        FrameTag::from_byte(self.tag)
    }

    /// Parses the JSON body.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| FrameError::Malformed {
            tag: self.tag_name(),
            reason: e.to_string(),
        })
    }

    /// Splits a data body into request id, stream id and payload.
    pub fn decode_data(&self) -> Result<(u64, u8, &[u8])> {
        let malformed = || FrameError::Malformed {
            tag: FrameTag::Data.as_str(),
            reason: format!("body of {} bytes is shorter than its header", self.body.len()),
        };
        let id_bytes: [u8; 8] = self
            .body
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(malformed)?;
        let stream = *self.body.get(8).ok_or_else(malformed)?;
        let payload = self.body.get(DATA_HEADER_SIZE..).ok_or_else(malformed)?;
        Ok((u64::from_be_bytes(id_bytes), stream, payload))
    }

    fn tag_name(&self) -> &'static str {
        self.known_tag().map(|t| t.as_str()).unwrap_or("unknown")
    }

    /// Total encoded length, prefix included.
    pub fn encoded_len(&self) -> usize {
        LEN_SIZE + 1 + self.body.len()
    }

    /// Encodes the frame, prefix included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = self.body.len() + 1;
        if len > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge {
                len,
                max: MAX_FRAME_SIZE,
            });
        }
        let prefix = u32::try_from(len).map_err(|_| FrameError::TooLarge {
            len,
            max: MAX_FRAME_SIZE,
        })?;
        let mut out = Vec::with_capacity(LEN_SIZE + len);
        out.extend_from_slice(&prefix.to_be_bytes());
        out.push(self.tag);
        out.extend_from_slice(&self.body);
        Ok(out)
    }
}

fn check_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(FrameError::Empty);
    }
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

/// Incremental decoder for byte streams that deliver partial frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes read from the stream.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete frame, or `None` if more bytes are needed.
    ///
    /// A size error leaves the stream unusable; the caller must close it.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(prefix) = self.buf.get(..LEN_SIZE) else {
            return Ok(None);
        };
        let mut len_bytes = [0u8; LEN_SIZE];
        len_bytes.copy_from_slice(prefix);
        let len = u32::from_be_bytes(len_bytes) as usize;
        check_len(len)?;
        if self.buf.len() < LEN_SIZE + len {
            return Ok(None);
        }
        let mut frame: Vec<u8> = self.buf.drain(..LEN_SIZE + len).collect();
        let body = frame.split_off(LEN_SIZE + 1);
        let tag = frame.get(LEN_SIZE).copied().ok_or(FrameError::Empty)?;
        Ok(Some(Frame { tag, body }))
    }
}

/// Writes a frame to a blocking writer.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    writer.write_all(&frame.encode()?)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame from a blocking reader.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    let mut len_buf = [0u8; LEN_SIZE];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    check_len(len)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    let body = buf.split_off(1);
    let tag = buf.first().copied().ok_or(FrameError::Empty)?;
    Ok(Frame { tag, body })
}

/// Writes a frame to an async writer.
pub async fn write_frame_async<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<()> {
    writer.write_all(&frame.encode()?).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame from an async reader.
pub async fn read_frame_async<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut len_buf = [0u8; LEN_SIZE];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    check_len(len)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let body = buf.split_off(1);
    let tag = buf.first().copied().ok_or(FrameError::Empty)?;
    Ok(Frame { tag, body })
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
