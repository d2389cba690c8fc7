// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use cs_proto::FrameTag;
use tokio::io::duplex;
use yare::parameterized;

fn pair() -> (StreamTransport<tokio::io::DuplexStream>, StreamTransport<tokio::io::DuplexStream>) {
    let (a, b) = duplex(64 * 1024);
    (StreamTransport::new(a, "a"), StreamTransport::new(b, "b"))
}

#[parameterized(
    bare_host = { "winbox", Scheme::Tcp, "winbox", DEFAULT_PORT },
    host_port = { "winbox:9000", Scheme::Tcp, "winbox", 9000 },
    tcp_scheme = { "tcp://10.0.0.2:7000", Scheme::Tcp, "10.0.0.2", 7000 },
    ws_scheme = { "ws://box", Scheme::WebSocket, "box", DEFAULT_PORT },
    ws_trailing_slash = { "ws://box:80/", Scheme::WebSocket, "box", 80 },
    ipv6_bracketed = { "[::1]:7000", Scheme::Tcp, "::1", 7000 },
    ipv6_bare = { "::1", Scheme::Tcp, "::1", DEFAULT_PORT },
)]
fn parses_addresses(input: &str, scheme: Scheme, host: &str, port: u16) {
    let address: Address = input.parse().unwrap();
    assert_eq!(address, Address::new(scheme, host, port));
}

#[parameterized(
    empty = { "" },
    bad_scheme = { "http://box" },
    bad_port = { "box:port" },
    port_overflow = { "box:70000" },
    unclosed_bracket = { "[::1:7000" },
    junk_after_bracket = { "[::1]x" },
)]
fn rejects_addresses(input: &str) {
    let err = input.parse::<Address>().unwrap_err();
    assert!(matches!(err, TransportError::InvalidAddress { .. }), "{}", err);
}

#[test]
fn address_display() {
    assert_eq!(Address::new(Scheme::Tcp, "box", 1).to_string(), "tcp://box:1");
    assert_eq!(
        Address::new(Scheme::WebSocket, "::1", 2).to_string(),
        "ws://[::1]:2"
    );
}

#[test]
fn backoff_doubles_up_to_max() {
    let max = Duration::from_millis(500);
    let mut delay = Duration::from_millis(100);
    let mut seen = Vec::new();
    for _ in 0..5 {
        delay = next_backoff(delay, max);
        seen.push(delay.as_millis());
    }
    assert_eq!(seen, vec![200, 400, 500, 500, 500]);
}

#[parameterized(
    refused = { ErrorKind::ConnectionRefused, true },
    reset = { ErrorKind::ConnectionReset, true },
    aborted = { ErrorKind::ConnectionAborted, true },
    timed_out = { ErrorKind::TimedOut, true },
    denied = { ErrorKind::PermissionDenied, false },
    invalid = { ErrorKind::InvalidData, false },
)]
fn io_errors_classified(kind: ErrorKind, transient: bool) {
    let err = TransportError::Connect {
        address: "box".to_string(),
        source: std::io::Error::from(kind),
    };
    assert_eq!(err.is_transient(), transient);
}

#[test]
fn fatal_errors_are_not_transient() {
    assert!(!TransportError::Closed.is_transient());
    assert!(!TransportError::Frame(FrameError::TooLarge { len: 1, max: 0 }).is_transient());
    assert!(TransportError::Timeout {
        during: "connecting".to_string(),
        after: Duration::from_secs(1),
    }
    .is_transient());
}

#[tokio::test]
async fn frames_cross_a_stream() {
    let (mut a, mut b) = pair();
    let frame = Frame::new(FrameTag::Goodbye, Vec::new());
    a.send(frame.clone()).await.unwrap();
    a.send(Frame::data(7, 0, b"abc")).await.unwrap();
    assert_eq!(b.recv().await.unwrap(), frame);
    assert_eq!(b.recv().await.unwrap().decode_data().unwrap(), (7, 0, &b"abc"[..]));
    assert_eq!(a.peer(), "a");
}

#[tokio::test]
async fn partial_writes_are_reassembled() {
    let (raw, b) = duplex(64 * 1024);
    let mut b = StreamTransport::new(b, "b");
    let bytes = Frame::data(1, 1, &[42u8; 1000]).encode().unwrap();

    let writer = tokio::spawn(async move {
        let mut raw = raw;
        for piece in bytes.chunks(7) {
            raw.write_all(piece).await.unwrap();
            raw.flush().await.unwrap();
            tokio::task::yield_now().await;
        }
        raw
    });
    let frame = b.recv().await.unwrap();
    let (id, stream, data) = frame.decode_data().unwrap();
    assert_eq!((id, stream, data.len()), (1, 1, 1000));
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn closed_stream_reports_closed() {
    let (mut a, mut b) = pair();
    a.close().await.unwrap();
    assert!(matches!(b.recv().await, Err(TransportError::Closed)));
}

#[tokio::test]
async fn recv_timeout_expires() {
    let (_a, mut b) = pair();
    let err = b.recv_timeout(Duration::from_millis(20)).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn connect_refused_gives_up_after_retries() {
    let config = TransportConfig {
        connect_timeout: Duration::from_secs(1),
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    };
    // Bind then drop, so the port is very likely closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let address = Address::new(Scheme::Tcp, "127.0.0.1", port);
    match connect(&address, &config).await {
        Err(err) => assert!(err.is_transient(), "{}", err),
        Ok(_) => unreachable!("nothing listens on port {}", port),
    }
}

#[tokio::test]
async fn connect_reaches_a_listener() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = StreamTransport::new(stream, "client");
        server.recv().await.unwrap()
    });

    let address = Address::new(Scheme::Tcp, "127.0.0.1", port);
    let mut client = connect(&address, &TransportConfig::default()).await.unwrap();
    client.send(Frame::new(FrameTag::Goodbye, Vec::new())).await.unwrap();
    assert_eq!(accept.await.unwrap().tag, FrameTag::Goodbye as u8);
}
