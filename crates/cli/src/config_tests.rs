// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

const EXAMPLE: &str = r#"
[remote]
host = "winbox"
port = 9000
request_timeout_secs = 60

[[sync]]
src = "/home/me/proj"
dest = "winbox:C:\\work\\proj"
filters = ["-target"]
symlinks = "preserve"

[[sync]]
src = "winbox:C:\\logs"
dest = "/tmp/logs"
delete = false
"#;

#[test]
fn parses_full_example() {
    let spec = SpecFile::parse(EXAMPLE, "example.toml").unwrap();
    assert_eq!(spec.remote.host.as_deref(), Some("winbox"));
    assert_eq!(spec.remote.port, 9000);
    assert_eq!(spec.remote.request_timeout_secs, 60);
    assert_eq!(spec.remote.connect_timeout_secs, 5);
    assert_eq!(spec.remote.max_retries, 5);
    assert_eq!(spec.sync.len(), 2);

    let first = &spec.sync[0];
    assert_eq!(first.dest, "winbox:C:\\work\\proj");
    assert_eq!(first.filters, vec!["-target".to_string()]);
    assert_eq!(first.symlinks, SymlinkPolicy::Preserve);
    assert!(first.delete);
    assert!(!first.overwrite_conflicts);

    let second = &spec.sync[1];
    assert_eq!(second.symlinks, SymlinkPolicy::Skip);
    assert!(!second.delete);
}

#[test]
fn empty_file_gives_defaults() {
    let spec = SpecFile::parse("", "empty.toml").unwrap();
    assert_eq!(spec, SpecFile::default());
    assert_eq!(spec.remote.port, DEFAULT_PORT);
}

#[test]
fn unknown_field_is_rejected() {
    let err = SpecFile::parse("[remote]\nhots = \"x\"\n", "typo.toml").unwrap_err();
    match err {
        Error::SpecParse { path, reason } => {
            assert_eq!(path, "typo.toml");
            assert!(reason.contains("hots"), "{}", reason);
        }
        other => unreachable!("unexpected error: {}", other),
    }
}

#[test]
fn missing_dest_is_rejected() {
    let err = SpecFile::parse("[[sync]]\nsrc = \"/a\"\n", "s.toml").unwrap_err();
    assert!(err.to_string().contains("dest"), "{}", err);
}

#[parameterized(
    connect = { "connect_timeout_secs" },
    negotiate = { "negotiate_timeout_secs" },
    request = { "request_timeout_secs" },
    run = { "run_timeout_secs" },
)]
fn zero_timeouts_are_rejected(field: &str) {
    let content = format!("[remote]\n{} = 0\n", field);
    let err = SpecFile::parse(&content, "zero.toml").unwrap_err();
    assert!(
        matches!(err, Error::ZeroNotAllowed { field: f } if f == field),
        "{}",
        err
    );
}

#[test]
fn load_reports_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = SpecFile::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, Error::SpecRead { .. }));
}

#[test]
fn load_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sync.toml");
    std::fs::write(&path, EXAMPLE).unwrap();
    assert_eq!(SpecFile::load(&path).unwrap().sync.len(), 2);
}

#[test]
fn address_uses_port_and_scheme() {
    let mut remote = RemoteSettings {
        port: 9000,
        ..RemoteSettings::default()
    };
    let address = remote.address("winbox").unwrap();
    assert_eq!(address.to_string(), "tcp://winbox:9000");

    remote.websocket = true;
    assert_eq!(remote.address("winbox").unwrap().scheme, Scheme::WebSocket);
}

#[test]
fn full_address_overrides_settings() {
    let remote = RemoteSettings::default();
    let address = remote.address("ws://box:1234").unwrap();
    assert_eq!(address.scheme, Scheme::WebSocket);
    assert_eq!(address.port, 1234);
}

#[test]
fn converts_to_runtime_configs() {
    let remote = SpecFile::parse(EXAMPLE, "example.toml").unwrap().remote;
    assert_eq!(
        remote.session_config().request_timeout,
        Duration::from_secs(60)
    );
    assert_eq!(
        remote.transport_config().connect_timeout,
        Duration::from_secs(5)
    );
    assert_eq!(remote.run_timeout(), None);
}

#[test]
fn deletion_policies_from_file() {
    let spec = SpecFile::parse(
        "[[sync]]\nsrc = \"a\"\ndest = \"box:/a\"\ndest_entry_needs_deleting = \"skip\"\ndest_root_needs_deleting = \"proceed\"\n",
        "inline",
    )
    .unwrap();
    assert_eq!(
        spec.sync[0].destructive(),
        Destructive {
            entry: DeletePolicy::Skip,
            root: DeletePolicy::Delete,
        }
    );
}

#[test]
fn deletion_policies_default_when_absent() {
    let spec = SpecFile::parse("[[sync]]\nsrc = \"a\"\ndest = \"box:/a\"\n", "inline").unwrap();
    assert_eq!(spec.sync[0].destructive(), Destructive::default());
}
