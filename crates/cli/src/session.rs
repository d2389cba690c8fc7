// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the session protocol.
//!
//! A [`Session`] exclusively owns one [`Transport`] and issues requests on
//! it one at a time. Any transport failure, timeout or protocol violation
//! closes the session; later calls fail with [`SessionError::Closed`].

use std::time::Duration;

use tracing::{debug, info, warn};

use cs_core::{Capabilities, Endpoint};
use cs_proto::{
    check_version, Cancel, DataStream, Hello, Message, RemoteError, Request, RequestOp,
    Response, ResponseBody, PROTOCOL_VERSION,
};

use crate::transport::{self, Address, Transport, TransportConfig, TransportError};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Negotiating,
    Ready,
    Closing,
    Closed,
}

/// Session timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub negotiate_timeout: Duration,
    /// Limit for each response, and for each frame of a streamed response.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            negotiate_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Failure to establish a session. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("protocol version mismatch: local {local}, remote {remote}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("peer rejected the session: {reason}")]
    Rejected { reason: String },

    #[error("unexpected {0} during negotiation")]
    Unexpected(String),

    #[error("no answer to hello within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure of a request on an established session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session closed")]
    Closed,

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The peer carried out the request and reported a failure.
    #[error("{op} failed on the peer: {error}")]
    Remote { op: &'static str, error: RemoteError },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Whether the session is unusable after this error.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::Remote { .. })
    }
}

/// One part of the answer to a streamed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Data(DataStream, Vec<u8>),
    Done(ResponseBody),
}

/// A negotiated channel to one peer.
pub struct Session {
    transport: Box<dyn Transport>,
    state: SessionState,
    local: Endpoint,
    remote: Endpoint,
    config: SessionConfig,
    next_id: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Dials `address` and negotiates.
    pub async fn connect(
        address: &Address,
        local: Endpoint,
        transport_config: &TransportConfig,
        config: SessionConfig,
    ) -> Result<Session, NegotiationError> {
        debug!("session {}: {:?}", address, SessionState::Connecting);
        let transport = transport::connect(address, transport_config).await?;
        Session::negotiate(transport, local, config).await
    }

    /// Exchanges `Hello` for `Welcome` on an open transport.
    ///
    /// Any version difference fails; the transport is closed on failure.
    pub async fn negotiate(
        mut transport: Box<dyn Transport>,
        local: Endpoint,
        config: SessionConfig,
    ) -> Result<Session, NegotiationError> {
        debug!("session {}: {:?}", transport.peer(), SessionState::Negotiating);
        match handshake(transport.as_mut(), &local, config.negotiate_timeout).await {
            Ok(mut remote) => {
                remote.address = transport.peer().to_string();
                info!(
                    "session with {} ready (os {}, protocol {})",
                    remote.address, remote.os, PROTOCOL_VERSION
                );
                Ok(Session {
                    transport,
                    state: SessionState::Ready,
                    local,
                    remote,
                    config,
                    next_id: 1,
                })
            }
            Err(e) => {
                warn!("negotiation with {} failed: {}", transport.peer(), e);
                let _ = transport.close().await;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn local(&self) -> &Endpoint {
        &self.local
    }

    /// The peer, addressed as it was dialed.
    pub fn remote(&self) -> &Endpoint {
        &self.remote
    }

    pub fn remote_capabilities(&self) -> &Capabilities {
        &self.remote.capabilities
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sends a request and waits for its response.
    ///
    /// A `Failed` response is returned as [`SessionError::Remote`] and
    /// leaves the session ready.
    pub async fn request(&mut self, op: RequestOp) -> Result<ResponseBody, SessionError> {
        let name = op.name();
        let id = self.begin(op).await?;
        let timeout = self.config.request_timeout;
        match self.next_reply(id, Some(timeout)).await? {
            Reply::Done(ResponseBody::Failed { error }) => Err(SessionError::Remote { op: name, error }),
            Reply::Done(body) => Ok(body),
            Reply::Data(..) => Err(self.violation(format!("unexpected data for {}", name)).await),
        }
    }

    /// Sends a request without waiting; the answer is read with
    /// [`Session::next_reply`].
    pub async fn begin(&mut self, op: RequestOp) -> Result<u64, SessionError> {
        self.ensure_ready()?;
        let id = self.next_id;
        self.next_id += 1;
        debug!("-> request #{} {}", id, op.name());
        self.send(Message::Request(Request { id, op })).await?;
        Ok(id)
    }

    /// Sends a chunk of content for request `id`.
    pub async fn send_data(&mut self, id: u64, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.ensure_ready()?;
        self.send(Message::data(id, DataStream::File, bytes)).await
    }

    /// Asks the peer to stop request `id`.
    pub async fn send_cancel(&mut self, id: u64) -> Result<(), SessionError> {
        self.ensure_ready()?;
        debug!("-> cancel #{}", id);
        self.send(Message::Cancel(Cancel { id })).await
    }

    /// Reads the next data chunk or the final response of request `id`.
    ///
    /// `timeout` bounds the wait for this single frame; `None` waits for
    /// as long as the peer takes.
    pub async fn next_reply(
        &mut self,
        id: u64,
        timeout: Option<Duration>,
    ) -> Result<Reply, SessionError> {
        self.ensure_ready()?;
        loop {
            let frame = match timeout {
                Some(after) => self.transport.recv_timeout(after).await,
                None => self.transport.recv().await,
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(TransportError::Timeout { after, .. }) => {
                    self.mark_closed();
                    return Err(SessionError::Timeout { op: "response", after });
                }
                Err(e) => {
                    self.mark_closed();
                    return Err(e.into());
                }
            };
            let message = match Message::from_frame(&frame) {
                Ok(message) => message,
                Err(e) if e.is_recoverable() => {
                    warn!("skipping frame from {}: {}", self.remote.address, e);
                    continue;
                }
                Err(e) => return Err(self.violation(e.to_string()).await),
            };
            debug!("<- {}", message.describe());
            return match message {
                Message::Response(Response { id: got, body }) if got == id => Ok(Reply::Done(body)),
                Message::Data(chunk) if chunk.id == id => Ok(Reply::Data(chunk.stream, chunk.bytes)),
                Message::Response(Response { id: got, .. }) => Err(self
                    .violation(format!("response #{} while waiting for #{}", got, id))
                    .await),
                Message::Data(chunk) => Err(self
                    .violation(format!("data for #{} while waiting for #{}", chunk.id, id))
                    .await),
                Message::Goodbye => {
                    info!("{} said goodbye", self.remote.address);
                    self.mark_closed();
                    Err(SessionError::Closed)
                }
                Message::Error(e) => {
                    self.mark_closed();
                    Err(SessionError::Protocol(format!("peer reported: {}", e.message)))
                }
                other => Err(self.violation(format!("unexpected {}", other.describe())).await),
            };
        }
    }

    /// Sends `Goodbye` and closes the transport.
    pub async fn close(&mut self) {
        if self.state != SessionState::Ready {
            self.state = SessionState::Closed;
            return;
        }
        self.state = SessionState::Closing;
        if let Err(e) = self.send_raw(Message::Goodbye).await {
            debug!("goodbye to {} not sent: {}", self.remote.address, e);
        }
        if let Err(e) = self.transport.close().await {
            debug!("closing {}: {}", self.remote.address, e);
        }
        self.state = SessionState::Closed;
        info!("session with {} closed", self.remote.address);
    }

    /// Gives up on the session without a goodbye; its stream state is
    /// unknown.
    pub async fn abandon(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        warn!("abandoning session with {}", self.remote.address);
        self.mark_closed();
        let _ = self.transport.close().await;
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    fn mark_closed(&mut self) {
        if self.state != SessionState::Closed {
            debug!("session {}: {:?}", self.remote.address, SessionState::Closed);
        }
        self.state = SessionState::Closed;
    }

    async fn send(&mut self, message: Message) -> Result<(), SessionError> {
        match self.send_raw(message).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.mark_closed();
                Err(e.into())
            }
        }
    }

    async fn send_raw(&mut self, message: Message) -> Result<(), TransportError> {
        let frame = message.to_frame()?;
        self.transport.send(frame).await
    }

    /// Reports a violation to the peer and closes.
    async fn violation(&mut self, message: String) -> SessionError {
        warn!("protocol violation from {}: {}", self.remote.address, message);
        let report = Message::Error(cs_proto::ProtocolError {
            message: message.clone(),
        });
        let _ = self.send_raw(report).await;
        let _ = self.transport.close().await;
        self.mark_closed();
        SessionError::Protocol(message)
    }
}

async fn handshake(
    transport: &mut dyn Transport,
    local: &Endpoint,
    timeout: Duration,
) -> Result<Endpoint, NegotiationError> {
    let hello = Message::Hello(Hello {
        version: PROTOCOL_VERSION,
        endpoint: local.clone(),
    });
    transport.send(hello.to_frame().map_err(TransportError::from)?).await?;

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let frame = match transport.recv_timeout(remaining).await {
            Ok(frame) => frame,
            Err(TransportError::Timeout { .. }) => return Err(NegotiationError::Timeout(timeout)),
            Err(e) => return Err(e.into()),
        };
        let message = match Message::from_frame(&frame) {
            Ok(message) => message,
            Err(e) if e.is_recoverable() => {
                warn!("skipping frame during negotiation: {}", e);
                continue;
            }
            Err(e) => return Err(TransportError::from(e).into()),
        };
        return match message {
            Message::Welcome(welcome) => {
                if check_version(welcome.version).is_err() {
                    return Err(NegotiationError::VersionMismatch {
                        local: PROTOCOL_VERSION,
                        remote: welcome.version,
                    });
                }
                Ok(welcome.endpoint)
            }
            Message::Reject(reject) if reject.version != PROTOCOL_VERSION => {
                Err(NegotiationError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: reject.version,
                })
            }
            Message::Reject(reject) => Err(NegotiationError::Rejected {
                reason: reject.reason,
            }),
            other => Err(NegotiationError::Unexpected(other.describe())),
        };
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
