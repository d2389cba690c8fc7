// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync locations: `[[user@]host:]path`.
//!
//! A colon makes a location remote, with two exceptions so local Windows
//! and relative paths keep working: a single letter before the colon is a
//! drive letter (`C:\work`), and a slash before the first colon means the
//! colon is part of a local path (`./a:b`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// One side of a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(RemoteLocation),
}

/// A path on a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    /// Accepted for familiarity; peers do not authenticate.
    pub user: Option<String>,
    pub host: String,
    /// Native path on the peer; `.` is the peer's root.
    pub path: String,
}

impl Location {
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidLocation {
            location: s.to_string(),
            reason: reason.to_string(),
        };
        if s.is_empty() {
            return Err(invalid("empty location"));
        }

        let (host_part, path) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unclosed '['"))?;
            let path = after
                .strip_prefix(':')
                .ok_or_else(|| invalid("expected ':' after ']'"))?;
            (format!("[{}]", host), path)
        } else {
            let Some((before, after)) = s.split_once(':') else {
                return Ok(Location::Local(PathBuf::from(s)));
            };
            if is_drive_letter(before) || before.contains('/') || before.contains('\\') {
                return Ok(Location::Local(PathBuf::from(s)));
            }
            (before.to_string(), after)
        };

        let (user, host) = match host_part.rsplit_once('@') {
            Some((user, host)) => (Some(user.to_string()), host.to_string()),
            None => (None, host_part),
        };
        if user.as_deref() == Some("") {
            return Err(invalid("empty user name"));
        }
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let path = if path.is_empty() { "." } else { path };
        Ok(Location::Remote(RemoteLocation {
            user,
            host,
            path: path.to_string(),
        }))
    }
}

fn is_drive_letter(s: &str) -> bool {
    let mut chars = s.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(remote) => write!(f, "{}", remote),
        }
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.path)
        } else {
            write!(f, "{}:{}", self.host, self.path)
        }
    }
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod tests;
