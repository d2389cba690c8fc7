// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Errors that end a peer session.
//!
//! Failures of a single request are not errors at this level: they are
//! reported to the client as a `Failed` response and the session goes on.

use cs_proto::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("client did not say hello within {0:?}")]
    NegotiationTimeout(std::time::Duration),

    #[error("connection closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for PeerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        PeerError::WebSocket(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
