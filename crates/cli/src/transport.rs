// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction: connections that carry protocol frames.
//!
//! Provides a trait-based transport layer that enables:
//! - Raw TCP and WebSocket connections to a `cs-peer`
//! - Any in-memory byte stream, e.g. a duplex pipe to an embedded peer

use std::fmt;
use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use cs_proto::{Frame, FrameDecoder, FrameError, DEFAULT_PORT};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// WebSocket handshake or stream failure.
    #[error("websocket error: {message}")]
    WebSocket { message: String, transient: bool },

    /// An operation did not complete in time.
    #[error("timed out after {after:?} while {during}")]
    Timeout { during: String, after: Duration },

    /// The other side closed the connection.
    #[error("connection closed")]
    Closed,

    /// A frame could not be encoded or decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("io error: {0}")]
    Io(std::io::Error),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        let transient = match &err {
            WsError::Io(e) => is_transient_io(e.kind()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => false,
            _ => false,
        };
        TransportError::WebSocket {
            message: err.to_string(),
            transient,
        }
    }
}

fn is_transient_io(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::AddrNotAvailable
    )
}

impl TransportError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Timeouts and refused, reset or aborted connections are transient.
    /// Protocol violations and oversized frames are not.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Connect { source, .. } | TransportError::Io(source) => {
                is_transient_io(source.kind())
            }
            TransportError::WebSocket { transient, .. } => *transient,
            TransportError::Timeout { .. } => true,
            TransportError::Closed
            | TransportError::Frame(_)
            | TransportError::InvalidAddress { .. } => false,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// A connection carrying whole frames.
pub trait Transport: Send {
    /// Sends one frame.
    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()>;

    /// Receives the next frame; [`TransportError::Closed`] once the other
    /// side is gone. Dropping the future before it completes loses nothing.
    fn recv(&mut self) -> TransportFuture<'_, Frame>;

    /// Closes the connection.
    fn close(&mut self) -> TransportFuture<'_, ()>;

    /// Where the connection leads, for messages and state keys.
    fn peer(&self) -> &str;

    /// Receives the next frame, giving up after `timeout`.
    fn recv_timeout(&mut self, timeout: Duration) -> TransportFuture<'_, Frame> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, self.recv()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    during: "waiting for a frame".to_string(),
                    after: timeout,
                }),
            }
        })
    }
}

/// Frames over any byte stream: TCP, pipes, in-memory duplex.
///
/// Tolerates partial reads; bytes are buffered in a [`FrameDecoder`]
/// until a whole frame is available.
pub struct StreamTransport<S> {
    stream: S,
    decoder: FrameDecoder,
    buf: Vec<u8>,
    peer: String,
}

const READ_BUF_SIZE: usize = 64 * 1024;

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        StreamTransport {
            stream,
            decoder: FrameDecoder::new(),
            buf: vec![0u8; READ_BUF_SIZE],
            peer: peer.into(),
        }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let bytes = frame.encode()?;
            self.stream.write_all(&bytes).await?;
            self.stream.flush().await?;
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Frame> {
        Box::pin(async move {
            loop {
                if let Some(frame) = self.decoder.next_frame()? {
                    return Ok(frame);
                }
                let n = self.stream.read(&mut self.buf).await?;
                if n == 0 {
                    return Err(TransportError::Closed);
                }
                self.decoder.push(&self.buf[..n]);
            }
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.stream.shutdown().await?;
            Ok(())
        })
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frames over a WebSocket, one frame per binary message.
pub struct WebSocketTransport {
    ws: WsStream,
    decoder: FrameDecoder,
    peer: String,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> TransportResult<Self> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(WebSocketTransport {
            ws,
            decoder: FrameDecoder::new(),
            peer: url.to_string(),
        })
    }
}

impl Transport for WebSocketTransport {
    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let bytes = frame.encode()?;
            self.ws.send(WsMessage::Binary(bytes.into())).await?;
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Frame> {
        Box::pin(async move {
            loop {
                if let Some(frame) = self.decoder.next_frame()? {
                    return Ok(frame);
                }
                match self.ws.next().await {
                    Some(Ok(WsMessage::Binary(bytes))) => self.decoder.push(&bytes),
                    Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
                    Some(Ok(WsMessage::Text(_))) => warn!("ignoring text message from {}", self.peer),
                    // Ping and pong are answered by tungstenite itself.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.ws.close(None).await?;
            Ok(())
        })
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

/// Wire flavor of a peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    WebSocket,
}

/// A peer address: `[tcp://|ws://]host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Address {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, with brackets around IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            Scheme::Tcp => write!(f, "tcp://{}", self.authority()),
            Scheme::WebSocket => write!(f, "ws://{}", self.authority()),
        }
    }
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TransportError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };
        let (scheme, rest) = if let Some(rest) = s.strip_prefix("tcp://") {
            (Scheme::Tcp, rest)
        } else if let Some(rest) = s.strip_prefix("ws://") {
            (Scheme::WebSocket, rest)
        } else if s.contains("://") {
            return Err(invalid("unsupported scheme (expected tcp:// or ws://)"));
        } else {
            (Scheme::Tcp, s)
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unclosed '['"))?;
            match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if after.is_empty() => (host, None),
                None => return Err(invalid("unexpected text after ']'")),
            }
        } else {
            match rest.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => (rest, None),
                Some((host, port)) => (host, Some(port)),
                None => (rest, None),
            }
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = match port {
            Some(port) => port.parse().map_err(|_| invalid("invalid port"))?,
            None => DEFAULT_PORT,
        };
        Ok(Address::new(scheme, host, port))
    }
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Limit for a single connection attempt.
    pub connect_timeout: Duration,
    /// Retries after the first attempt fails transiently.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            connect_timeout: Duration::from_secs(5),
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Exponential backoff with a cap.
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Connects to `address`, retrying transient failures with backoff.
pub async fn connect(
    address: &Address,
    config: &TransportConfig,
) -> TransportResult<Box<dyn Transport>> {
    let mut delay = config.initial_backoff;
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        match connect_once(address, config.connect_timeout).await {
            Ok(transport) => {
                debug!("connected to {} (attempt {})", address, attempt);
                return Ok(transport);
            }
            Err(e) if e.is_transient() && attempt <= config.max_retries => {
                warn!(
                    "connecting to {} failed (attempt {}): {}; retrying in {:?}",
                    address, attempt, e, delay
                );
                tokio::time::sleep(delay).await;
                delay = next_backoff(delay, config.max_backoff);
            }
            Err(e) => return Err(e),
        }
    }
}

async fn connect_once(address: &Address, timeout: Duration) -> TransportResult<Box<dyn Transport>> {
    let attempt = async {
        match address.scheme {
            Scheme::Tcp => {
                let stream = TcpStream::connect(address.authority())
                    .await
                    .map_err(|source| TransportError::Connect {
                        address: address.to_string(),
                        source,
                    })?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("set_nodelay failed: {}", e);
                }
                Ok(Box::new(StreamTransport::new(stream, address.to_string())) as Box<dyn Transport>)
            }
            Scheme::WebSocket => {
                let transport = WebSocketTransport::connect(&address.to_string()).await?;
                Ok(Box::new(transport) as Box<dyn Transport>)
            }
        }
    };
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            during: format!("connecting to {}", address),
            after: timeout,
        }),
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
