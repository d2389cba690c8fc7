// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Spec files.
//!
//! A spec file describes one peer and any number of syncs against it:
//!
//! ```toml
//! [remote]
//! host = "winbox"
//! port = 7711
//! request_timeout_secs = 30
//!
//! [[sync]]
//! src = "/home/me/proj"
//! dest = "winbox:C:\\work\\proj"
//! filters = ["-target"]
//! symlinks = "skip"
//! dest_root_needs_deleting = "error"
//! ```
//!
//! Command-line flags override what the file says.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use cs_core::SymlinkPolicy;
use cs_proto::DEFAULT_PORT;

use crate::engine::{DeletePolicy, Destructive};
use crate::error::{Error, Result};
use crate::session::SessionConfig;
use crate::transport::{Address, Scheme, TransportConfig};

/// Contents of a spec file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecFile {
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub sync: Vec<SyncEntry>,
}

/// How to reach the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSettings {
    /// Default peer for `exec` and `ping`.
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Speak WebSocket instead of raw TCP.
    #[serde(default)]
    pub websocket: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_negotiate_timeout_secs")]
    pub negotiate_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Limit for applying one sync; unlimited when absent.
    pub run_timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_negotiate_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            host: None,
            port: default_port(),
            websocket: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            negotiate_timeout_secs: default_negotiate_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            run_timeout_secs: None,
        }
    }
}

/// One sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncEntry {
    pub src: String,
    pub dest: String,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub symlinks: SymlinkPolicy,
    /// Delete destination entries absent from the source.
    #[serde(default = "default_delete")]
    pub delete: bool,
    #[serde(default)]
    pub overwrite_conflicts: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_entry_needs_deleting: Option<DeletePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_root_needs_deleting: Option<DeletePolicy>,
}

impl SyncEntry {
    /// The deletion policies, with defaults for what is not set.
    pub fn destructive(&self) -> Destructive {
        let defaults = Destructive::default();
        Destructive {
            entry: self.dest_entry_needs_deleting.unwrap_or(defaults.entry),
            root: self.dest_root_needs_deleting.unwrap_or(defaults.root),
        }
    }
}

fn default_delete() -> bool {
    true
}

impl SpecFile {
    /// Reads and validates a spec file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::SpecRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parses and validates spec text; `origin` names it in errors.
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let spec: SpecFile = toml::from_str(content).map_err(|e| Error::SpecParse {
            path: origin.to_string(),
            reason: e.message().to_string(),
        })?;
        spec.remote.validate()?;
        Ok(spec)
    }
}

impl RemoteSettings {
    /// Rejects zero limits, which would make every attempt fail.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("negotiate_timeout_secs", self.negotiate_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("run_timeout_secs", self.run_timeout_secs.unwrap_or(1)),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(Error::ZeroNotAllowed { field: *field }),
            None => Ok(()),
        }
    }

    /// The address of `host`.
    ///
    /// A host written as a full address (`ws://box:9000`) is used as is;
    /// otherwise the configured port and scheme apply.
    pub fn address(&self, host: &str) -> Result<Address> {
        if host.contains("://") {
            return Ok(host.parse()?);
        }
        let scheme = if self.websocket {
            Scheme::WebSocket
        } else {
            Scheme::Tcp
        };
        Ok(Address::new(scheme, host, self.port))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_retries: self.max_retries,
            ..TransportConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            negotiate_timeout: Duration::from_secs(self.negotiate_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
