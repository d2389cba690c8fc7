// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness bridge.
//!
//! Cross-OS tests run against a genuine peer named by
//! `CROSSYNC_REMOTE_PEER`. Without one, [`LoopbackPeer`] serves the same
//! protocol in-process over a duplex pipe, advertising whatever
//! capability set the test injects.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::debug;

use cs_core::{Capabilities, Endpoint, OsFamily};
use cs_peer::PeerConfig;

use crate::env;
use crate::session::{NegotiationError, Session, SessionConfig};
use crate::transport::{Address, StreamTransport, Transport};

/// Buffer size of the in-memory pipe.
const PIPE_CAPACITY: usize = 256 * 1024;

/// Address reported by loopback sessions.
pub const LOOPBACK_ADDRESS: &str = "loopback";

/// The genuine peer configured for this run, if any.
pub fn remote_peer() -> Option<Address> {
    let value = env::remote_peer()?;
    match value.trim().parse() {
        Ok(address) => Some(address),
        Err(e) => {
            debug!("ignoring {}: {}", env::vars::CROSSYNC_REMOTE_PEER, e);
            None
        }
    }
}

/// Whether tests that need a genuine peer can run.
pub fn has_remote_peer() -> bool {
    remote_peer().is_some()
}

/// An in-process peer.
///
/// Each call to [`LoopbackPeer::connect`] starts a fresh peer session on
/// its own task. Peers made with [`LoopbackPeer::new`] and friends are
/// confined to a temporary root that lives as long as the value.
pub struct LoopbackPeer {
    config: Arc<PeerConfig>,
    root: Option<TempDir>,
}

impl LoopbackPeer {
    /// A peer with this host's capabilities and a temporary root.
    pub fn new() -> std::io::Result<Self> {
        Self::with_endpoint(Endpoint::new(LOOPBACK_ADDRESS, OsFamily::current()))
    }

    /// A peer claiming to run `os`, with that family's usual capabilities.
    pub fn with_os(os: OsFamily) -> std::io::Result<Self> {
        Self::with_endpoint(Endpoint::new(LOOPBACK_ADDRESS, os))
    }

    /// A peer advertising `capabilities`.
    pub fn with_capabilities(os: OsFamily, capabilities: Capabilities) -> std::io::Result<Self> {
        Self::with_endpoint(Endpoint::new(LOOPBACK_ADDRESS, os).with_capabilities(capabilities))
    }

    fn with_endpoint(endpoint: Endpoint) -> std::io::Result<Self> {
        let root = tempfile::Builder::new().prefix("crossync-peer").tempdir()?;
        let jail = root.path().canonicalize()?;
        Ok(LoopbackPeer {
            config: Arc::new(PeerConfig::new(endpoint).with_jail(jail)),
            root: Some(root),
        })
    }

    /// A peer serving the whole local file system, for `--loopback` runs.
    pub fn unconfined() -> Self {
        let endpoint = Endpoint::new(LOOPBACK_ADDRESS, OsFamily::current());
        LoopbackPeer {
            config: Arc::new(PeerConfig::new(endpoint)),
            root: None,
        }
    }

    /// The directory the peer is confined to.
    pub fn root(&self) -> Option<&Path> {
        self.config.jail.as_deref()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    /// Starts a peer session and returns the client end of its pipe.
    pub fn transport(&self) -> Box<dyn Transport> {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        let config = Arc::clone(&self.config);
        tokio::spawn(async move {
            if let Err(e) = cs_peer::serve_stream(server, config).await {
                debug!("loopback peer session ended: {}", e);
            }
        });
        Box::new(StreamTransport::new(client, LOOPBACK_ADDRESS))
    }

    /// Opens a negotiated session to a fresh peer session.
    pub async fn connect(
        &self,
        local: Endpoint,
        config: SessionConfig,
    ) -> Result<Session, NegotiationError> {
        Session::negotiate(self.transport(), local, config).await
    }
}

impl std::fmt::Debug for LoopbackPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackPeer")
            .field("endpoint", &self.config.endpoint)
            .field("root", &self.root.as_ref().map(TempDir::path))
            .finish()
    }
}

#[cfg(test)]
#[path = "harness_tests.rs"]
mod tests;
