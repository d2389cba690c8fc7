// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Progress of applying a sync plan, drawn on stderr.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

const TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{bar:30}] {pos}/{len} ops {msg}";

/// A progress bar over the operations of one plan.
///
/// Clones share the same bar. Nothing is drawn when stderr is not a
/// terminal.
#[derive(Clone)]
pub struct SyncProgress {
    bar: ProgressBar,
    bytes: Arc<AtomicU64>,
    total_bytes: Arc<AtomicU64>,
}

impl SyncProgress {
    /// A bar drawn on stderr.
    pub fn stderr() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr()))
    }

    /// A bar that counts but never draws.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        match ProgressStyle::with_template(TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(e) => debug!("keeping default progress style: {}", e),
        }
        SyncProgress {
            bar,
            bytes: Arc::new(AtomicU64::new(0)),
            total_bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts over for a plan of `ops` operations moving `bytes` bytes.
    pub fn start(&self, ops: u64, bytes: u64) {
        self.bytes.store(0, Ordering::Relaxed);
        self.total_bytes.store(bytes, Ordering::Relaxed);
        self.bar.set_length(ops);
        self.bar.set_position(0);
        self.bar.reset_elapsed();
        self.refresh();
    }

    /// Counts one finished operation that moved `bytes`.
    pub fn advance(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.bar.inc(1);
        self.refresh();
    }

    /// Removes the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Operations counted so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Bytes counted so far.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn refresh(&self) {
        self.bar.set_message(format!(
            "{} / {}",
            HumanBytes(self.bytes()),
            HumanBytes(self.total_bytes.load(Ordering::Relaxed))
        ));
    }
}

impl fmt::Debug for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncProgress")
            .field("position", &self.position())
            .field("length", &self.bar.length())
            .field("bytes", &self.bytes())
            .finish()
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
