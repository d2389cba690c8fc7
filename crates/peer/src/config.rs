// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Peer configuration and root confinement.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use cs_core::{Capabilities, Endpoint, LocalTree};
use cs_proto::{RemoteError, RemoteErrorKind};

/// How long a new connection may take to send its `Hello`.
pub const DEFAULT_NEGOTIATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by every session of one peer.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// What the peer advertises in `Welcome`.
    pub endpoint: Endpoint,
    /// When set, every root and working directory must lie inside it.
    pub jail: Option<PathBuf>,
    pub negotiate_timeout: Duration,
}

impl PeerConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        PeerConfig {
            endpoint,
            jail: None,
            negotiate_timeout: DEFAULT_NEGOTIATE_TIMEOUT,
        }
    }

    pub fn with_jail(mut self, jail: impl Into<PathBuf>) -> Self {
        self.jail = Some(jail.into());
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.endpoint.capabilities
    }

    /// Maps a root sent by a client to a native directory.
    ///
    /// Without a jail the root is used as given. With one, relative roots
    /// are taken relative to the jail and absolute roots must lie inside it;
    /// `..` is refused in both cases.
    pub fn resolve_root(&self, root: &str) -> Result<PathBuf, RemoteError> {
        let requested = Path::new(root);
        let Some(jail) = &self.jail else {
            return Ok(requested.to_path_buf());
        };
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(outside(root));
        }
        if requested.has_root() || requested.is_absolute() {
            if requested.starts_with(jail) {
                Ok(requested.to_path_buf())
            } else {
                Err(outside(root))
            }
        } else {
            Ok(jail.join(requested))
        }
    }

    /// Working directory of a command; defaults to the jail, if any.
    pub fn resolve_cwd(&self, cwd: Option<&str>) -> Result<Option<PathBuf>, RemoteError> {
        match cwd {
            Some(cwd) => self.resolve_root(cwd).map(Some),
            None => Ok(self.jail.clone()),
        }
    }

    /// A tree rooted at a client-supplied root.
    pub fn tree(&self, root: &str) -> Result<LocalTree, RemoteError> {
        Ok(LocalTree::new(self.resolve_root(root)?, self.capabilities()))
    }
}

fn outside(root: &str) -> RemoteError {
    RemoteError::new(
        RemoteErrorKind::InvalidRequest,
        format!("'{}' is outside the peer's root", root),
    )
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
