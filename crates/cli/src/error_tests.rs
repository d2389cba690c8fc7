// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::time::Duration;

#[test]
fn test_invalid_location_display() {
    let err = Error::InvalidLocation {
        location: "host:".to_string(),
        reason: "empty path".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("invalid location 'host:'"));
    assert!(msg.contains("empty path"));
}

#[test]
fn test_need_one_remote_has_hint() {
    let msg = Error::NeedOneRemote.to_string();
    assert!(msg.contains("exactly one"));
    assert!(msg.contains("hint:"));
}

#[test]
fn test_spec_parse_display() {
    let err = Error::SpecParse {
        path: "sync.toml".to_string(),
        reason: "missing field `src`".to_string(),
    };
    assert!(err.to_string().contains("sync.toml"));
    assert!(err.to_string().contains("missing field"));
}

#[test]
fn test_negotiation_error_converts() {
    let err: Error = NegotiationError::VersionMismatch {
        local: 1,
        remote: 2,
    }
    .into();
    assert!(matches!(err, Error::Negotiation(_)));
    assert!(err.to_string().contains("local 1, remote 2"));
}

#[test]
fn test_transport_error_converts() {
    let err: Error = TransportError::Timeout {
        during: "connecting".to_string(),
        after: Duration::from_secs(5),
    }
    .into();
    assert!(err.to_string().starts_with("connection failed"));
}

#[test]
fn test_sync_error_converts() {
    let err: Error = SyncError::NoSession.into();
    assert_eq!(err.to_string(), "sync failed: no usable session");
}
