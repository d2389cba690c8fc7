// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use cs_core::{LineEnding, PermissionModel};
use cs_proto::{RequestOp, ResponseBody};

#[test]
fn new_peer_is_confined_to_a_temp_root() {
    let peer = LoopbackPeer::new().unwrap();
    let root = peer.root().unwrap().to_path_buf();
    assert!(root.is_dir());
    assert!(root.is_absolute());
    assert_eq!(peer.endpoint().address, LOOPBACK_ADDRESS);
    assert_eq!(peer.endpoint().os, OsFamily::current());

    drop(peer);
    assert!(!root.exists());
}

#[test]
fn unconfined_peer_has_no_root() {
    let peer = LoopbackPeer::unconfined();
    assert!(peer.root().is_none());
}

#[test]
fn os_selects_conventional_capabilities() {
    let peer = LoopbackPeer::with_os(OsFamily::Windows).unwrap();
    assert_eq!(peer.endpoint().capabilities, Capabilities::for_os(OsFamily::Windows));
}

#[test]
fn injected_capabilities_are_advertised() {
    let capabilities = Capabilities {
        line_ending: LineEnding::Crlf,
        permissions: PermissionModel::ReadOnlyFlag,
        ..Capabilities::for_os(OsFamily::Linux)
    };
    let peer = LoopbackPeer::with_capabilities(OsFamily::Linux, capabilities).unwrap();
    assert_eq!(peer.endpoint().capabilities, capabilities);
    assert!(format!("{:?}", peer).contains("LoopbackPeer"));
}

#[tokio::test]
async fn each_connect_gets_its_own_session() {
    let capabilities = Capabilities {
        case_sensitive: false,
        ..Capabilities::for_os(OsFamily::Linux)
    };
    let peer = LoopbackPeer::with_capabilities(OsFamily::Linux, capabilities).unwrap();
    let mut first = peer
        .connect(Endpoint::local(), SessionConfig::default())
        .await
        .unwrap();
    let mut second = peer
        .connect(Endpoint::local(), SessionConfig::default())
        .await
        .unwrap();

    assert!(!first.remote_capabilities().case_sensitive);
    first.close().await;
    // Closing one session leaves the other serving.
    assert_eq!(second.request(RequestOp::Ping).await.unwrap(), ResponseBody::Pong);
    second.close().await;
}

#[tokio::test]
async fn raw_transport_names_the_loopback() {
    let peer = LoopbackPeer::new().unwrap();
    let transport = peer.transport();
    assert_eq!(transport.peer(), LOOPBACK_ADDRESS);
}
