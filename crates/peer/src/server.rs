// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Peer sessions and the accept loop.
//!
//! Each connection is one session: negotiation, then requests served one
//! at a time in arrival order until the client says goodbye or goes away.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use cs_proto::{
    check_version, Message, ProtocolError, Reject, Request, RequestOp, ResponseBody, Welcome,
    PROTOCOL_VERSION,
};

use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::exec::{self, Invocation};
use crate::handler;
use crate::link::Link;
use crate::transfer::{self, SnapshotRequest, Upload};

/// Serves one session over a byte stream (TCP, pipe, in-memory duplex).
pub async fn serve_stream<S>(stream: S, config: Arc<PeerConfig>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    serve_link(Link::stream(stream), &config).await
}

/// Serves one session over a WebSocket upgraded from `stream`.
pub async fn serve_websocket<S>(stream: S, config: Arc<PeerConfig>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws = tokio_tungstenite::accept_async(stream).await?;
    serve_link(Link::websocket(ws), &config).await
}

/// Accepts connections until the listener fails.
pub async fn run(listener: TcpListener, config: PeerConfig, websocket: bool) -> Result<()> {
    let config = Arc::new(config);
    info!(
        "listening on {} ({})",
        listener.local_addr()?,
        if websocket { "websocket" } else { "tcp" }
    );
    loop {
        let (stream, addr) = listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed for {}: {}", addr, e);
        }
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            info!("connection from {}", addr);
            let result = if websocket {
                serve_websocket(stream, config).await
            } else {
                serve_stream(stream, config).await
            };
            match result {
                Ok(()) => info!("connection from {} closed", addr),
                Err(e) => warn!("connection from {} failed: {}", addr, e),
            }
        });
    }
}

async fn serve_link(mut link: Link, config: &PeerConfig) -> Result<()> {
    let result = Session { link: &mut link, config }.run().await;
    if let Err(PeerError::Protocol(message)) = &result {
        let _ = link
            .send(Message::Error(ProtocolError {
                message: message.clone(),
            }))
            .await;
    }
    link.close().await;
    result
}

struct Session<'a> {
    link: &'a mut Link,
    config: &'a PeerConfig,
}

impl Session<'_> {
    async fn run(mut self) -> Result<()> {
        if !self.negotiate().await? {
            return Ok(());
        }
        while let Some(message) = self.link.recv().await {
            match message {
                Message::Request(request) => self.dispatch(request).await?,
                Message::Cancel(cancel) => {
                    debug!("ignoring cancel for finished request #{}", cancel.id)
                }
                Message::Goodbye => {
                    debug!("client said goodbye");
                    return Ok(());
                }
                other => {
                    return Err(PeerError::Protocol(format!(
                        "unexpected {} between requests",
                        other.describe()
                    )))
                }
            }
        }
        debug!("client went away");
        Ok(())
    }

    /// Returns `false` when the client was rejected.
    async fn negotiate(&mut self) -> Result<bool> {
        let wait = self.config.negotiate_timeout;
        let first = tokio::time::timeout(wait, self.link.recv())
            .await
            .map_err(|_| PeerError::NegotiationTimeout(wait))?;
        let hello = match first {
            Some(Message::Hello(hello)) => hello,
            Some(other) => {
                return Err(PeerError::Protocol(format!(
                    "expected hello, got {}",
                    other.describe()
                )))
            }
            None => return Err(PeerError::Closed),
        };
        if let Err(reason) = check_version(hello.version) {
            warn!("rejecting {}: {}", hello.endpoint, reason);
            self.link
                .send(Message::Reject(Reject {
                    version: PROTOCOL_VERSION,
                    reason,
                }))
                .await?;
            return Ok(false);
        }
        info!("session with {}", hello.endpoint);
        self.link
            .send(Message::Welcome(Welcome {
                version: PROTOCOL_VERSION,
                endpoint: self.config.endpoint.clone(),
            }))
            .await?;
        Ok(true)
    }

    async fn dispatch(&mut self, request: Request) -> Result<()> {
        let id = request.id;
        let name = request.op.name();
        debug!("#{} {}", id, name);
        let body = match request.op {
            RequestOp::Snapshot {
                root,
                filters,
                symlinks,
                missing_ok,
                entry,
            } => {
                let request = SnapshotRequest {
                    root,
                    filters,
                    symlinks,
                    missing_ok,
                    entry,
                };
                transfer::send_snapshot(self.link, self.config, id, request).await?
            }
            RequestOp::ReadFile {
                root,
                path,
                expected,
            } => {
                transfer::send_file(self.link, self.config, id, &root, &path, expected.as_ref())
                    .await?
            }
            RequestOp::WriteFile {
                root,
                path,
                expected,
                size,
                hash,
                permissions,
                modified,
            } => {
                let upload = Upload {
                    root,
                    path,
                    expected,
                    size,
                    hash,
                    permissions,
                    modified,
                };
                transfer::receive_file(self.link, self.config, id, upload).await?
            }
            RequestOp::Exec {
                program,
                args,
                cwd,
                timeout_ms,
            } => match self.config.resolve_cwd(cwd.as_deref()) {
                Ok(cwd) => {
                    let invocation = Invocation {
                        program,
                        args,
                        cwd,
                        timeout: timeout_ms.map(Duration::from_millis),
                    };
                    exec::run(self.link, id, invocation).await?
                }
                Err(error) => ResponseBody::Failed { error },
            },
            op => handler::handle(self.config, op),
        };
        if let ResponseBody::Failed { error } = &body {
            debug!("#{} {} failed: {}", id, name, error);
        }
        self.link.send(Message::response(id, body)).await
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
