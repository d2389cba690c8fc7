// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoints and their negotiated capability sets.
//!
//! Everything OS-specific the sync engine cares about is captured once in a
//! [`Capabilities`] value at negotiation time. Code elsewhere branches on
//! these flags, never on [`OsFamily`] directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operating system family of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Linux,
    Windows,
    Other,
}

impl OsFamily {
    /// The family of the running process.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => OsFamily::Linux,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }

    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Windows => "windows",
            OsFamily::Other => "other",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(OsFamily::Linux),
            "windows" => Ok(OsFamily::Windows),
            "other" => Ok(OsFamily::Other),
            _ => Err(format!("invalid os family: '{}'", s)),
        }
    }
}

/// Line terminator convention for text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }
}

/// How an endpoint represents file permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModel {
    /// Full rwx mode bits for user, group and other.
    UnixMode,
    /// A single read-only attribute.
    ReadOnlyFlag,
}

/// Which file names an endpoint can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRules {
    /// Any byte except `/` and NUL.
    Posix,
    /// No `<>:"\|?*`, no control characters, no trailing dot or space,
    /// no reserved device names.
    Windows,
}

/// Negotiated facts about one side of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Native path separator.
    pub path_separator: char,
    /// Whether `a.txt` and `A.txt` are distinct entries.
    pub case_sensitive: bool,
    /// Line terminator used by native programs.
    pub line_ending: LineEnding,
    /// How permissions are stored.
    pub permissions: PermissionModel,
    /// Whether symbolic links can be created.
    pub symlinks: bool,
    /// Which names are representable.
    pub name_rules: NameRules,
    /// Whether several requests may be in flight on one session.
    pub multiplex: bool,
}

impl Capabilities {
    /// The conventional capability set for an OS family.
    pub fn for_os(os: OsFamily) -> Self {
        match os {
            OsFamily::Windows => Capabilities {
                path_separator: '\\',
                case_sensitive: false,
                line_ending: LineEnding::Crlf,
                permissions: PermissionModel::ReadOnlyFlag,
                symlinks: false,
                name_rules: NameRules::Windows,
                multiplex: false,
            },
            OsFamily::Linux | OsFamily::Other => Capabilities {
                path_separator: '/',
                case_sensitive: true,
                line_ending: LineEnding::Lf,
                permissions: PermissionModel::UnixMode,
                symlinks: true,
                name_rules: NameRules::Posix,
                multiplex: false,
            },
        }
    }

    /// The capability set of the running process.
    pub fn local() -> Self {
        Self::for_os(OsFamily::current())
    }
}

/// A connection target: where it is, what it runs, and what it can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Address the endpoint was reached at (or `local`).
    pub address: String,
    /// Operating system family.
    pub os: OsFamily,
    /// Capability set advertised during negotiation.
    pub capabilities: Capabilities,
}

impl Endpoint {
    /// Creates an endpoint with the conventional capabilities for `os`.
    pub fn new(address: impl Into<String>, os: OsFamily) -> Self {
        Endpoint {
            address: address.into(),
            os,
            capabilities: Capabilities::for_os(os),
        }
    }

    /// Describes the running process.
    pub fn local() -> Self {
        Self::new("local", OsFamily::current())
    }

    /// Replaces the capability set, keeping address and OS family.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Stable identity used to key persisted state.
    pub fn identity(&self) -> String {
        format!("{}/{}", self.os, self.address)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.os)
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
