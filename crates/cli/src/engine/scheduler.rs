// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Partial-order dispatch of plan operations to workers.
//!
//! An operation becomes ready once every operation it depends on has
//! finished. When one of those failed, the operation is not handed out
//! but recorded as blocked, and the failure travels on to its own
//! dependents.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

use super::report::SyncError;

/// What a worker should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Next {
    Run(usize),
    /// Nothing is ready yet; wait for a running operation to finish.
    Wait,
    Done,
}

pub(crate) type Outcome = Result<u64, SyncError>;

#[derive(Debug)]
struct State {
    /// Unfinished dependencies per operation.
    pending: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    /// First failed dependency, if any.
    blocked_by: Vec<Option<usize>>,
    ready: VecDeque<usize>,
    outcomes: Vec<Option<Outcome>>,
    running: usize,
    resolved: usize,
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    state: Mutex<State>,
    notify: Notify,
    /// Action name and path of each operation, for blocked messages.
    labels: Vec<(&'static str, cs_core::RelPath)>,
}

impl Scheduler {
    /// `dependencies[i]` lists the operations `i` waits for; all lower
    /// than `i`.
    pub(crate) fn new(
        dependencies: &[Vec<usize>],
        labels: Vec<(&'static str, cs_core::RelPath)>,
    ) -> Self {
        let count = dependencies.len();
        let mut dependents = vec![Vec::new(); count];
        let mut pending = vec![0; count];
        let mut ready = VecDeque::new();
        for (op, deps) in dependencies.iter().enumerate() {
            pending[op] = deps.len();
            for &dep in deps {
                if let Some(list) = dependents.get_mut(dep) {
                    list.push(op);
                }
            }
            if deps.is_empty() {
                ready.push_back(op);
            }
        }
        Scheduler {
            state: Mutex::new(State {
                pending,
                dependents,
                blocked_by: vec![None; count],
                ready,
                outcomes: (0..count).map(|_| None).collect(),
                running: 0,
                resolved: 0,
            }),
            notify: Notify::new(),
            labels,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hands out the next ready operation.
    pub(crate) fn next(&self) -> Next {
        let mut state = self.lock();
        while let Some(op) = state.ready.pop_front() {
            if let Some(blocker) = state.blocked_by[op] {
                let (action, path) = self.labels[blocker].clone();
                state.outcomes[op] = Some(Err(SyncError::Blocked { path, action }));
                self.resolve(&mut state, op, true);
                continue;
            }
            state.running += 1;
            return Next::Run(op);
        }
        if state.resolved == state.outcomes.len() || state.running == 0 {
            Next::Done
        } else {
            Next::Wait
        }
    }

    /// Records the outcome of a handed-out operation.
    pub(crate) fn complete(&self, op: usize, outcome: Outcome) {
        {
            let mut state = self.lock();
            state.running = state.running.saturating_sub(1);
            let failed = outcome.is_err();
            state.outcomes[op] = Some(outcome);
            self.resolve(&mut state, op, failed);
        }
        self.notify.notify_waiters();
    }

    fn resolve(&self, state: &mut State, op: usize, failed: bool) {
        state.resolved += 1;
        let dependents = std::mem::take(&mut state.dependents[op]);
        for dependent in dependents {
            if failed && state.blocked_by[dependent].is_none() {
                state.blocked_by[dependent] = Some(op);
            }
            state.pending[dependent] = state.pending[dependent].saturating_sub(1);
            if state.pending[dependent] == 0 {
                state.ready.push_back(dependent);
            }
        }
    }

    /// Signalled whenever an operation finishes. Take a `notified()`
    /// future before calling [`Scheduler::next`] so no wakeup is lost.
    pub(crate) fn notify(&self) -> &Notify {
        &self.notify
    }

    /// Takes all outcomes; operations never run get `unfinished()`.
    pub(crate) fn into_outcomes(self, mut unfinished: impl FnMut() -> SyncError) -> Vec<Outcome> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state
            .outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(|| Err(unfinished())))
            .collect()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
