// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! OS-neutral relative paths.
//!
//! A [`RelPath`] is always relative to a sync root and always uses `/` as the
//! separator, whatever the OS of either endpoint. Translation to a native
//! path happens only at the file-system boundary ([`RelPath::to_native`]).

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::endpoint::NameRules;
use crate::error::{Error, Result};

/// Device names Windows reserves regardless of extension.
const WINDOWS_RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Characters Windows does not allow in a file name.
const WINDOWS_FORBIDDEN: &[char] = &['<', '>', ':', '"', '\\', '|', '?', '*'];

/// A validated, slash-separated path relative to a sync root.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    /// Parses a slash-separated relative path.
    ///
    /// Rejects empty paths, absolute paths, empty components, `.` and `..`.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.is_empty() {
            return Err(Error::invalid_path(path, "empty path"));
        }
        if path.contains('\0') {
            return Err(Error::invalid_path(path, "contains NUL"));
        }
        for component in path.split('/') {
            match component {
                "" => return Err(Error::invalid_path(path, "empty component")),
                "." | ".." => return Err(Error::PathEscapesRoot(path)),
                _ => {}
            }
        }
        Ok(RelPath(path))
    }

    /// Converts a native path relative to some root into a [`RelPath`].
    pub fn from_native(relative: &Path) -> Result<Self> {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        Error::invalid_path(relative.display().to_string(), "not valid UTF-8")
                    })?;
                    parts.push(name);
                }
                Component::CurDir => {}
                _ => return Err(Error::PathEscapesRoot(relative.display().to_string())),
            }
        }
        Self::new(parts.join("/"))
    }

    /// Joins this path onto a native root.
    pub fn to_native(&self, root: &Path) -> PathBuf {
        let mut native = root.to_path_buf();
        for component in self.components() {
            native.push(component);
        }
        native
    }

    /// Appends a single component.
    pub fn join(&self, name: &str) -> Result<Self> {
        Self::new(format!("{}/{}", self.0, name))
    }

    /// The slash-separated string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the components from the root downwards.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Number of components; `a` has depth 1, `a/b` depth 2.
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// The last component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The containing path, or `None` for a top-level entry.
    pub fn parent(&self) -> Option<RelPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| RelPath(parent.to_string()))
    }

    /// All proper ancestors, nearest first.
    pub fn ancestors(&self) -> Vec<RelPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(p) = current {
            current = p.parent();
            out.push(p);
        }
        out
    }

    /// True when `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &RelPath) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes().get(self.0.len()) == Some(&b'/')
    }

    /// Key used to compare paths on a case-insensitive endpoint.
    pub fn fold_key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Checks every component can be stored under the given naming rules.
    ///
    /// Returns a human-readable reason when it cannot.
    pub fn check_representable(&self, rules: NameRules) -> std::result::Result<(), String> {
        if rules == NameRules::Posix {
            return Ok(());
        }
        for component in self.components() {
            if let Some(c) = component
                .chars()
                .find(|c| WINDOWS_FORBIDDEN.contains(c) || c.is_control())
            {
                return Err(format!("'{}' contains forbidden character {:?}", component, c));
            }
            if component.ends_with('.') || component.ends_with(' ') {
                return Err(format!("'{}' ends with a dot or space", component));
            }
            let stem = component.split('.').next().unwrap_or(component);
            if WINDOWS_RESERVED
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(stem))
            {
                return Err(format!("'{}' is a reserved device name", component));
            }
        }
        Ok(())
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl TryFrom<String> for RelPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        RelPath::new(value)
    }
}

impl From<RelPath> for String {
    fn from(path: RelPath) -> Self {
        path.0
    }
}

/// Normalizes a symlink target to forward slashes for cross-OS comparison.
pub fn normalize_link_target(target: &Path) -> String {
    target.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
