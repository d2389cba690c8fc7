// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Message pumps between a connection and a session.
//!
//! A reader task decodes incoming frames into a bounded queue and a writer
//! task drains a bounded queue of outgoing messages. When the client stops
//! reading, the outgoing queue fills up and whoever produces output (a
//! running command, a file being sent) waits.
//!
//! A message that cannot be encoded is never dropped silently: a response
//! becomes a `Failed` response for the same request, anything else a
//! protocol `Error`.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use cs_proto::{
    recv_message, FrameDecoder, FrameError, Message, ProtocolError, RemoteError, RemoteErrorKind,
};

use crate::error::{PeerError, Result};

/// Depth of the incoming and outgoing queues.
const QUEUE_DEPTH: usize = 16;

pub(crate) struct Link {
    incoming: mpsc::Receiver<Message>,
    outgoing: mpsc::Sender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    /// Pumps frames over a byte stream.
    pub(crate) fn stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (in_tx, incoming) = mpsc::channel(QUEUE_DEPTH);
        let (outgoing, out_rx) = mpsc::channel(QUEUE_DEPTH);
        Link {
            incoming,
            outgoing,
            reader: tokio::spawn(read_stream(read_half, in_tx)),
            writer: tokio::spawn(write_stream(write_half, out_rx)),
        }
    }

    /// Pumps frames over a WebSocket, one frame per binary message.
    pub(crate) fn websocket<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let (in_tx, incoming) = mpsc::channel(QUEUE_DEPTH);
        let (outgoing, mut out_rx) = mpsc::channel::<Message>(QUEUE_DEPTH);
        let reader = tokio::spawn(read_websocket(stream, in_tx));
        let writer = tokio::spawn(async move {
            let mut sink = sink;
            while let Some(message) = out_rx.recv().await {
                let Some(bytes) = encode(&message) else {
                    continue;
                };
                if let Err(e) = sink.send(WsMessage::Binary(bytes.into())).await {
                    warn!("websocket send failed: {}", e);
                    return;
                }
            }
            let _ = sink.close().await;
        });
        Link {
            incoming,
            outgoing,
            reader,
            writer,
        }
    }

    /// Next message from the client; `None` once the connection is gone.
    pub(crate) async fn recv(&mut self) -> Option<Message> {
        self.incoming.recv().await
    }

    /// Queues a message, waiting while the outgoing queue is full.
    pub(crate) async fn send(&self, message: Message) -> Result<()> {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| PeerError::Closed)
    }

    /// Flushes queued messages and tears the pumps down.
    pub(crate) async fn close(self) {
        let Link {
            outgoing,
            reader,
            writer,
            ..
        } = self;
        drop(outgoing);
        let _ = writer.await;
        reader.abort();
    }
}

async fn read_stream<R>(mut reader: R, tx: mpsc::Sender<Message>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match recv_message(&mut reader).await {
            Ok(message) => {
                if !deliver(&tx, message).await {
                    return;
                }
            }
            Err(e) if e.is_recoverable() => warn!("skipping frame: {}", e),
            Err(FrameError::Closed) => {
                debug!("client closed the stream");
                return;
            }
            Err(e) => {
                warn!("read failed: {}", e);
                return;
            }
        }
    }
}

async fn write_stream<W>(mut writer: W, mut rx: mpsc::Receiver<Message>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let Some(bytes) = encode(&message) else {
            continue;
        };
        let written = match writer.write_all(&bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!("write failed: {}", e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Encodes an outgoing message, substituting a report of the failure when
/// the message itself cannot be encoded.
pub(crate) fn encode(message: &Message) -> Option<Vec<u8>> {
    let err = match message.to_frame().and_then(|f| f.encode()) {
        Ok(bytes) => return Some(bytes),
        Err(e) => e,
    };
    warn!("cannot encode {}: {}", message.describe(), err);
    let substitute = match message {
        Message::Response(response) => Message::failed(
            response.id,
            RemoteError::new(
                RemoteErrorKind::Io,
                format!("response could not be sent: {}", err),
            ),
        ),
        other => Message::Error(ProtocolError {
            message: format!("could not encode {}: {}", other.describe(), err),
        }),
    };
    match substitute.to_frame().and_then(|f| f.encode()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("dropping {}: {}", message.describe(), e);
            None
        }
    }
}

async fn read_websocket<S>(
    mut stream: futures_util::stream::SplitStream<WebSocketStream<S>>,
    tx: mpsc::Sender<Message>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(WsMessage::Binary(bytes)) => {
                decoder.push(&bytes);
                loop {
                    let frame = match decoder.next_frame() {
                        Ok(Some(frame)) => frame,
                        Ok(None) => break,
                        Err(e) => {
                            warn!("bad frame: {}", e);
                            return;
                        }
                    };
                    match Message::from_frame(&frame) {
                        Ok(message) => {
                            if !deliver(&tx, message).await {
                                return;
                            }
                        }
                        Err(e) => warn!("skipping frame: {}", e),
                    }
                }
            }
            Ok(WsMessage::Close(_)) => {
                debug!("client closed the websocket");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("websocket error: {}", e);
                return;
            }
        }
    }
}

async fn deliver(tx: &mpsc::Sender<Message>, message: Message) -> bool {
    debug!("<- {}", message.describe());
    tx.send(message).await.is_ok()
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
