// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod exec;
pub mod ping;
pub mod sync;

use std::fmt;

use tracing::debug;

use cs_core::Endpoint;

use crate::cli::ConnectArgs;
use crate::config::{RemoteSettings, SpecFile};
use crate::env;
use crate::error::{Error, Result};
use crate::harness::{LoopbackPeer, LOOPBACK_ADDRESS};
use crate::session::{NegotiationError, Session, SessionConfig};
use crate::transport::{Address, TransportConfig};

/// How a command ended, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Some paths of a sync did not converge.
    Partial,
    /// Exit with this code, e.g. a remote command's.
    Code(i32),
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Partial => 2,
            Outcome::Code(code) => code,
        }
    }
}

/// Reads the spec file named by `--spec` or `CROSSYNC_SPEC`, then applies
/// the command-line overrides. Without a file the defaults apply.
pub fn load_settings(connect: &ConnectArgs) -> Result<SpecFile> {
    let mut spec = match connect.spec.clone().or_else(env::spec_file) {
        Some(path) => {
            debug!("reading spec file {}", path.display());
            SpecFile::load(&path)?
        }
        None => SpecFile::default(),
    };
    let remote = &mut spec.remote;
    if let Some(port) = connect.port {
        remote.port = port;
    }
    if connect.websocket {
        remote.websocket = true;
    }
    if let Some(secs) = connect.connect_timeout {
        remote.connect_timeout_secs = secs;
    }
    if let Some(secs) = connect.request_timeout {
        remote.request_timeout_secs = secs;
    }
    remote.validate()?;
    Ok(spec)
}

#[derive(Debug)]
enum Peer {
    Loopback(LoopbackPeer),
    Remote(Address),
}

/// Opens sessions to one peer.
#[derive(Debug)]
pub struct Connector {
    peer: Peer,
    transport: TransportConfig,
    session: SessionConfig,
}

impl Connector {
    /// With `loopback` set, sessions go to an in-process peer serving this
    /// machine and `host` is ignored.
    pub fn new(host: Option<&str>, settings: &RemoteSettings, loopback: bool) -> Result<Self> {
        let peer = if loopback {
            Peer::Loopback(LoopbackPeer::unconfined())
        } else {
            let host = host.or(settings.host.as_deref()).ok_or(Error::NoHost)?;
            Peer::Remote(settings.address(host)?)
        };
        Ok(Connector {
            peer,
            transport: settings.transport_config(),
            session: settings.session_config(),
        })
    }

    /// Connects and negotiates a new session.
    pub async fn open(&self) -> Result<Session> {
        let local = Endpoint::local();
        let opened = match &self.peer {
            Peer::Loopback(peer) => peer.connect(local, self.session).await,
            Peer::Remote(address) => {
                Session::connect(address, local, &self.transport, self.session).await
            }
        };
        opened.map_err(|e| match e {
            NegotiationError::Transport(e) => Error::Transport(e),
            other => Error::Negotiation(other),
        })
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.peer {
            Peer::Loopback(_) => write!(f, "{}", LOOPBACK_ADDRESS),
            Peer::Remote(address) => write!(f, "{}", address),
        }
    }
}

/// Prints lines to stdout.
fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
