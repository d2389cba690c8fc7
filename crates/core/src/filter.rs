// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Include/exclude filters for tree snapshots.
//!
//! A filter is `+regex` (include) or `-regex` (exclude). Regexes are matched
//! against the whole normalized relative path (forward slashes, no trailing
//! slash); a substring match is not enough. If the first filter includes,
//! entries are excluded unless some filter includes them; if it excludes,
//! entries are included unless some filter excludes them. Later filters
//! override earlier ones. Directories are descended into unless a filter
//! explicitly excludes them, so an include-first list still reaches nested
//! files.

use regex::Regex;

use crate::error::{Error, Result};
use crate::path::RelPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Include,
    Exclude,
}

#[derive(Debug, Clone)]
struct Filter {
    kind: FilterKind,
    regex: Regex,
}

/// An ordered list of filters.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
    patterns: Vec<String>,
}

impl FilterSet {
    /// Parses filters of the form `+regex` / `-regex`.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut filters = Vec::with_capacity(specs.len());
        let mut patterns = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = spec.as_ref();
            let (kind, pattern) = if let Some(rest) = spec.strip_prefix('+') {
                (FilterKind::Include, rest)
            } else if let Some(rest) = spec.strip_prefix('-') {
                (FilterKind::Exclude, rest)
            } else {
                return Err(Error::InvalidFilter(spec.to_string()));
            };
            let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
                Error::FilterRegex {
                    pattern: pattern.to_string(),
                    source,
                }
            })?;
            filters.push(Filter { kind, regex });
            patterns.push(spec.to_string());
        }
        Ok(FilterSet { filters, patterns })
    }

    /// The filters in their original textual form.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// The kind of the last filter matching `path`, if any.
    pub fn last_match(&self, path: &RelPath) -> Option<FilterKind> {
        self.filters
            .iter()
            .rev()
            .find(|filter| filter.regex.is_match(path.as_str()))
            .map(|filter| filter.kind)
    }

    /// Whether a file or symlink at `path` passes the filters.
    pub fn is_included(&self, path: &RelPath) -> bool {
        let Some(first) = self.filters.first() else {
            return true;
        };
        match self.last_match(path) {
            Some(kind) => kind == FilterKind::Include,
            None => first.kind == FilterKind::Exclude,
        }
    }

    /// Whether a directory at `path` is kept and descended into.
    pub fn is_dir_included(&self, path: &RelPath) -> bool {
        self.last_match(path) != Some(FilterKind::Exclude)
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
