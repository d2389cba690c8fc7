// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Policies for operations that lose destination data.
//!
//! [`guard`] runs between planning and applying. Every deletion in the
//! plan, and a destination root that has to be replaced, is checked
//! against a [`DeletePolicy`]: kept, dropped (with everything that waits
//! on it), refused, or put to the user.

use std::fmt;
use std::io::{BufRead, IsTerminal, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cs_core::{PlanIssue, SyncOp};

use super::{Layout, SyncError, SyncJob};

/// What to do when the destination is about to lose data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Ask on the terminal; without one, behave like `Error`.
    Prompt,
    /// Refuse, and fail the sync before anything changes.
    Error,
    /// Leave the entry alone and carry on with the rest.
    Skip,
    /// Go ahead.
    #[serde(alias = "proceed")]
    Delete,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletePolicy::Prompt => "prompt",
            DeletePolicy::Error => "error",
            DeletePolicy::Skip => "skip",
            DeletePolicy::Delete => "delete",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prompt" => Ok(DeletePolicy::Prompt),
            "error" => Ok(DeletePolicy::Error),
            "skip" => Ok(DeletePolicy::Skip),
            "delete" | "proceed" => Ok(DeletePolicy::Delete),
            _ => Err(format!(
                "invalid policy: '{}' (expected prompt, error, skip or delete)",
                s
            )),
        }
    }
}

/// The policies of one sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destructive {
    /// Deleting an entry inside the destination root.
    pub entry: DeletePolicy,
    /// Deleting or replacing the destination root itself.
    pub root: DeletePolicy,
}

impl Default for Destructive {
    fn default() -> Self {
        Destructive {
            entry: DeletePolicy::Delete,
            root: DeletePolicy::Prompt,
        }
    }
}

impl Destructive {
    /// Applies a blanket policy to every policy not already `Skip`.
    pub fn with_all(mut self, all: DeletePolicy) -> Self {
        for policy in [&mut self.entry, &mut self.root] {
            if *policy != DeletePolicy::Skip {
                *policy = all;
            }
        }
        self
    }
}

/// A user's answer to one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Yes, and to every later question of the same kind.
    All,
    /// No, and to every later question of the same kind.
    None,
    /// Stop the sync.
    Cancel,
}

impl Answer {
    fn parse(line: &str) -> Option<Answer> {
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(Answer::Yes),
            "n" | "no" => Some(Answer::No),
            "a" | "all" => Some(Answer::All),
            "o" | "none" => Some(Answer::None),
            "c" | "cancel" | "" => Some(Answer::Cancel),
            _ => None,
        }
    }
}

/// Puts questions to the user.
pub trait Confirm {
    fn ask(&mut self, question: &str) -> Answer;
}

/// Asks on stderr and reads the answer from stdin.
///
/// Without a terminal on both, every question is answered with
/// [`Answer::Cancel`].
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn ask(&mut self, question: &str) -> Answer {
        if !std::io::stdin().is_terminal() || !std::io::stderr().is_terminal() {
            debug!("no terminal to ask: {}", question);
            return Answer::Cancel;
        }
        let stdin = std::io::stdin();
        loop {
            eprint!("{} [y]es/[n]o/[a]ll/n[o]ne/[c]ancel: ", question);
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return Answer::Cancel,
                Ok(_) => {}
            }
            if let Some(answer) = Answer::parse(&line) {
                return answer;
            }
        }
    }
}

/// Scripted answers, in order; runs out into [`Answer::Cancel`].
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: std::collections::VecDeque<Answer>,
    /// Every question asked so far.
    pub asked: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        ScriptedConfirm {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn ask(&mut self, question: &str) -> Answer {
        self.asked.push(question.to_string());
        self.answers.pop_front().unwrap_or(Answer::Cancel)
    }
}

/// Whether one destructive step goes ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Proceed,
    Drop,
}

/// One policy together with what the user chose for all remaining
/// questions of its kind.
struct Decider {
    policy: DeletePolicy,
    flag: &'static str,
}

impl Decider {
    fn decide(&mut self, what: &str, confirm: &mut dyn Confirm) -> Result<Verdict, SyncError> {
        let flag = self.flag;
        let refused = || SyncError::Refused {
            what: what.to_string(),
            flag,
        };
        match self.policy {
            DeletePolicy::Delete => Ok(Verdict::Proceed),
            DeletePolicy::Skip => Ok(Verdict::Drop),
            DeletePolicy::Error => Err(refused()),
            DeletePolicy::Prompt => match confirm.ask(&format!("{}?", what)) {
                Answer::Yes => Ok(Verdict::Proceed),
                Answer::No => Ok(Verdict::Drop),
                Answer::All => {
                    self.policy = DeletePolicy::Delete;
                    Ok(Verdict::Proceed)
                }
                Answer::None => {
                    self.policy = DeletePolicy::Skip;
                    Ok(Verdict::Drop)
                }
                Answer::Cancel => Err(refused()),
            },
        }
    }
}

/// Checks the destructive steps of `job` against `policies`.
///
/// Dropped deletions become [`PlanIssue::Blocked`], and so does every
/// operation that waits on one. A skipped root replacement empties the
/// plan. Refusals fail before anything is changed.
pub fn guard(
    job: &mut SyncJob,
    policies: &Destructive,
    confirm: &mut dyn Confirm,
) -> Result<(), SyncError> {
    let mut entry = Decider {
        policy: policies.entry,
        flag: "--dest-entry-needs-deleting",
    };
    let mut root = Decider {
        policy: policies.root,
        flag: "--dest-root-needs-deleting",
    };
    let destination = job.plan.direction.destination();

    if job.replace_root {
        let what = format!(
            "replace the {} destination root, which is not a directory",
            destination
        );
        if root.decide(&what, confirm)? == Verdict::Drop {
            warn!("skipped: {}; nothing synced", what);
            job.clear();
            return Ok(());
        }
    }

    let root_entry = match &job.layout {
        Layout::Entry { .. } => true,
        Layout::Trees => false,
    };
    let mut dropped = vec![false; job.plan.ops.len()];
    for (index, op) in job.plan.ops.iter().enumerate() {
        if !op.action.is_delete() {
            continue;
        }
        let what = format!("delete {} on the {} side", op.path, destination);
        let (decider, what) = if root_entry {
            (&mut root, format!("{}, replacing the destination root", what))
        } else {
            (&mut entry, what)
        };
        if decider.decide(&what, confirm)? == Verdict::Drop {
            dropped[index] = true;
        }
    }
    if !dropped.contains(&true) {
        return Ok(());
    }

    let deps = job.plan.dependencies();
    let mut kept = Vec::with_capacity(job.plan.ops.len());
    let ops = std::mem::take(&mut job.plan.ops);
    for (index, op) in ops.into_iter().enumerate() {
        let waits = deps.get(index).is_some_and(|deps| {
            deps.iter()
                .any(|&d| dropped.get(d).copied().unwrap_or(false))
        });
        let reason = if dropped[index] {
            "deletion declined"
        } else if waits {
            dropped[index] = true;
            "waits on a declined deletion"
        } else {
            kept.push(op);
            continue;
        };
        info!("leaving {} alone: {}", op.path, reason);
        job.plan.issues.push(blocked(&op, reason));
    }
    job.plan.ops = kept;
    Ok(())
}

fn blocked(op: &SyncOp, reason: &str) -> PlanIssue {
    PlanIssue::Blocked {
        path: op.path.clone(),
        reason: format!("{}: {}", op.action.name(), reason),
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
