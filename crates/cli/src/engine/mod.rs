// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronization engine.
//!
//! A sync run has two steps:
//!
//! 1. [`plan`] snapshots the local tree and, over a session, the peer's
//!    tree, loads the base state of the pair and computes a [`SyncPlan`];
//! 2. [`apply`] carries the plan out with one worker per session,
//!    following the plan's partial order, and updates the base state.
//!
//! In between, [`guard`] holds deletions and root replacements to the
//! caller's [`Destructive`] policies.
//!
//! A failed operation never stops the run: it is recorded, its dependents
//! are recorded as blocked, and everything else proceeds.

mod guard;
mod ops;
mod report;
mod scheduler;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cs_core::{
    scan_root, BaseState, Capabilities, Direction, FilterSet, LocalTree, PlanIssue, PlanOptions,
    RelPath, RootKind, ScanOptions, Side, Snapshot, StateKey, StateStore, SymlinkPolicy,
    SyncPlan,
};
use cs_proto::{decode_records, DataStream, RequestOp, ResponseBody};

use crate::progress::SyncProgress;
use crate::session::{Reply, Session, SessionError};
use ops::OpContext;
use scheduler::{Next, Scheduler};

pub use guard::{
    guard, Answer, Confirm, DeletePolicy, Destructive, ScriptedConfirm, TerminalConfirm,
};
pub use report::{CompletedOp, FailedOp, SyncError, SyncReport, SyncStats};

/// Settings of a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub direction: Direction,
    /// Ordered `+regex` / `-regex` rules.
    pub filters: Vec<String>,
    pub symlinks: SymlinkPolicy,
    /// Delete destination entries absent from the source.
    pub delete_extraneous: bool,
    /// Let the source win when both sides changed.
    pub overwrite_conflicts: bool,
    /// The destination was written with a trailing separator: a single
    /// source file goes inside it rather than replacing it.
    pub into_dir: bool,
    /// Where base states live; `None` disables conflict tracking.
    pub state: Option<StateStore>,
    /// Limit for the whole apply step.
    pub run_timeout: Option<Duration>,
    pub progress: Option<SyncProgress>,
}

impl SyncOptions {
    pub fn new(direction: Direction) -> Self {
        SyncOptions {
            direction,
            filters: Vec::new(),
            symlinks: SymlinkPolicy::default(),
            delete_extraneous: true,
            overwrite_conflicts: false,
            into_dir: false,
            state: None,
            run_timeout: None,
            progress: None,
        }
    }

    fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            direction: self.direction,
            delete_extraneous: self.delete_extraneous,
            overwrite_conflicts: self.overwrite_conflicts,
        }
    }
}

/// How the source root lines up with the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Both roots are trees; a missing destination root is created.
    Trees,
    /// The source root is a single entry called `source`, synced as
    /// `name` inside the destination's directory.
    Entry { source: RelPath, name: RelPath },
}

/// A computed plan and what applying it needs.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub plan: SyncPlan,
    /// Directory the local side of the plan's paths hang off.
    pub local_root: PathBuf,
    /// Directory the remote side of the plan's paths hang off.
    pub remote_root: String,
    pub layout: Layout,
    /// The destination root is not a directory and has to go first.
    pub replace_root: bool,
    /// Emptied by [`SyncJob::clear`]; the base state is left as it was.
    cleared: bool,
    local_caps: Capabilities,
    state_key: StateKey,
    source: Snapshot,
    base: Option<BaseState>,
}

impl SyncJob {
    /// The base state the plan was computed against.
    pub fn base(&self) -> Option<&BaseState> {
        self.base.as_ref()
    }

    /// Drops every operation and any pending root replacement.
    pub fn clear(&mut self) {
        self.plan.ops.clear();
        self.replace_root = false;
        self.cleared = true;
    }
}

/// Snapshots both trees and plans the run.
///
/// The source root must exist. A source root that is not a directory is
/// synced as a single entry (see [`Layout::Entry`]); a missing destination
/// root counts as empty.
pub async fn plan(
    local_root: &Path,
    remote_root: &str,
    session: &mut Session,
    options: &SyncOptions,
) -> Result<SyncJob, SyncError> {
    let filters = FilterSet::parse(&options.filters).map_err(SyncError::Filter)?;
    let local_caps = session.local().capabilities;
    let remote_caps = session.remote().capabilities;
    let direction = options.direction;
    let mut scanner = Scanner {
        session,
        options,
        scan: ScanOptions {
            filters,
            symlinks: options.symlinks,
            permissions: local_caps.permissions,
        },
    };

    let source_root = Root::of(direction.source(), local_root, remote_root);
    let (source_kind, tree) = scanner.snapshot(&source_root, None, false).await?;
    let (layout, local_dir, remote_dir, source, destination, replace_root) =
        if source_kind == RootKind::File {
            let entry = EntryRoots::new(direction, local_root, remote_root, options.into_dir)?;
            let (_, source) = scanner.snapshot(&source_root, Some(&entry.name), false).await?;
            let (_, destination) = scanner
                .snapshot(&entry.destination, Some(&entry.name), true)
                .await?;
            debug!("syncing single entry {} as {}", entry.source, entry.name);
            let layout = Layout::Entry {
                source: entry.source,
                name: entry.name,
            };
            (layout, entry.local_dir, entry.remote_dir, source, destination, false)
        } else {
            let destination_root = Root::of(direction.destination(), local_root, remote_root);
            let (kind, destination) = scanner.snapshot(&destination_root, None, true).await?;
            if kind == RootKind::File {
                debug!("destination root {} is not a directory", destination_root);
            }
            (
                Layout::Trees,
                local_root.to_path_buf(),
                remote_root.to_string(),
                tree,
                destination,
                kind == RootKind::File,
            )
        };

    let session = scanner.session;
    let state_key = StateKey::new(local_root, session.remote(), remote_root);
    let base = match &options.state {
        Some(store) => store.load(&state_key).map_err(SyncError::State)?,
        None => None,
    };

    let destination_caps = match direction.destination() {
        Side::Local => local_caps,
        Side::Remote => remote_caps,
    };
    let plan = cs_core::plan(
        &source,
        &destination,
        base.as_ref(),
        &options.plan_options(),
        &destination_caps,
    );
    info!(
        "planned {} ({} ops, {} issues) for {} and {}:{}",
        direction,
        plan.len(),
        plan.issues.len(),
        local_root.display(),
        session.remote().address,
        remote_root
    );
    Ok(SyncJob {
        plan,
        local_root: local_dir,
        remote_root: remote_dir,
        layout,
        replace_root,
        cleared: false,
        local_caps,
        state_key,
        source,
        base,
    })
}

/// A root on one side.
enum Root {
    Local(PathBuf),
    Remote(String),
}

impl Root {
    fn of(side: Side, local: &Path, remote: &str) -> Self {
        match side {
            Side::Local => Root::Local(local.to_path_buf()),
            Side::Remote => Root::Remote(remote.to_string()),
        }
    }
}

impl std::fmt::Display for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Root::Local(path) => write!(f, "{}", path.display()),
            Root::Remote(root) => write!(f, "{}", root),
        }
    }
}

/// Where a single-entry sync reads and writes.
struct EntryRoots {
    /// Name of the source entry in its own directory.
    source: RelPath,
    /// Name of the entry in the destination directory.
    name: RelPath,
    /// The destination entry itself, scanned as `name`.
    destination: Root,
    local_dir: PathBuf,
    remote_dir: String,
}

impl EntryRoots {
    fn new(
        direction: Direction,
        local_root: &Path,
        remote_root: &str,
        into_dir: bool,
    ) -> Result<Self, SyncError> {
        let local_split = || -> Result<(PathBuf, RelPath), SyncError> {
            let name = local_root
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| RelPath::new(n).ok())
                .ok_or_else(|| no_name(Side::Local, &local_root.display().to_string()))?;
            let dir = match local_root.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            Ok((dir, name))
        };
        let remote_split = || split_remote(remote_root).ok_or_else(|| no_name(Side::Remote, remote_root));

        match direction {
            Direction::LocalToRemote => {
                let (local_dir, source) = local_split()?;
                let (remote_dir, name, destination) = if into_dir {
                    let dir = remote_root.trim_end_matches(['/', '\\']).to_string();
                    let entry = join_remote(&dir, &source);
                    (dir, source.clone(), entry)
                } else {
                    let (dir, name) = remote_split()?;
                    (dir, name, remote_root.to_string())
                };
                Ok(EntryRoots {
                    source,
                    name,
                    destination: Root::Remote(destination),
                    local_dir,
                    remote_dir,
                })
            }
            Direction::RemoteToLocal => {
                let (remote_dir, source) = remote_split()?;
                let (local_dir, name, destination) = if into_dir {
                    let entry = source.to_native(local_root);
                    (local_root.to_path_buf(), source.clone(), entry)
                } else {
                    let (dir, name) = local_split()?;
                    (dir, name, local_root.to_path_buf())
                };
                Ok(EntryRoots {
                    source,
                    name,
                    destination: Root::Local(destination),
                    local_dir,
                    remote_dir,
                })
            }
        }
    }
}

fn no_name(side: Side, root: &str) -> SyncError {
    SyncError::Snapshot {
        side,
        root: root.to_string(),
        reason: "a single-entry root needs a file name".to_string(),
    }
}

/// Splits a remote root into its directory and final name. Either
/// separator counts, since the peer may run any OS.
fn split_remote(root: &str) -> Option<(String, RelPath)> {
    let trimmed = root.trim_end_matches(['/', '\\']);
    let (dir, name) = match trimmed.rfind(['/', '\\']) {
        None => (".".to_string(), trimmed),
        Some(0) => (trimmed[..1].to_string(), &trimmed[1..]),
        Some(i) if trimmed[..i].ends_with(':') => (trimmed[..=i].to_string(), &trimmed[i + 1..]),
        Some(i) => (trimmed[..i].to_string(), &trimmed[i + 1..]),
    };
    let name = RelPath::new(name).ok()?;
    (name.depth() == 1).then_some((dir, name))
}

/// Joins a single name onto a remote directory with the separator the
/// directory already uses.
fn join_remote(dir: &str, name: &RelPath) -> String {
    let separator = if dir.contains('\\') && !dir.contains('/') {
        '\\'
    } else {
        '/'
    };
    if dir.ends_with(['/', '\\']) {
        format!("{}{}", dir, name)
    } else {
        format!("{}{}{}", dir, separator, name)
    }
}

/// Takes snapshots on either side of a session.
struct Scanner<'a> {
    session: &'a mut Session,
    options: &'a SyncOptions,
    scan: ScanOptions,
}

impl Scanner<'_> {
    async fn snapshot(
        &mut self,
        root: &Root,
        entry: Option<&RelPath>,
        missing_ok: bool,
    ) -> Result<(RootKind, Snapshot), SyncError> {
        match root {
            Root::Local(path) => {
                scan_root(path, entry, missing_ok, &self.scan).map_err(|e| SyncError::Snapshot {
                    side: Side::Local,
                    root: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
            Root::Remote(root) => {
                remote_snapshot(self.session, root, entry, missing_ok, self.options).await
            }
        }
    }
}

async fn remote_snapshot(
    session: &mut Session,
    root: &str,
    entry: Option<&RelPath>,
    missing_ok: bool,
    options: &SyncOptions,
) -> Result<(RootKind, Snapshot), SyncError> {
    let request = RequestOp::Snapshot {
        root: root.to_string(),
        filters: options.filters.clone(),
        symlinks: options.symlinks,
        missing_ok,
        entry: entry.cloned(),
    };
    let id = session.begin(request).await?;
    let timeout = session.config().request_timeout;
    let mut records = Vec::new();
    loop {
        match session.next_reply(id, Some(timeout)).await? {
            Reply::Data(DataStream::Records, bytes) => {
                let batch = decode_records(&bytes)
                    .map_err(|e| SessionError::Protocol(format!("snapshot of {}: {}", root, e)))?;
                records.extend(batch);
            }
            Reply::Data(stream, bytes) => {
                warn!("ignoring {} {:?} bytes for snapshot #{}", bytes.len(), stream, id);
            }
            Reply::Done(ResponseBody::Snapshot { entries, root: kind }) => {
                if entries != records.len() as u64 {
                    return Err(SessionError::Protocol(format!(
                        "snapshot of {} announced {} entries, received {}",
                        root,
                        entries,
                        records.len()
                    ))
                    .into());
                }
                debug!("remote snapshot of {} ({}): {} entries", root, kind, entries);
                return Ok((kind, Snapshot::from_records(records)));
            }
            Reply::Done(ResponseBody::Failed { error }) => {
                return Err(SyncError::Snapshot {
                    side: Side::Remote,
                    root: root.to_string(),
                    reason: error.message,
                })
            }
            Reply::Done(other) => {
                return Err(SessionError::Protocol(format!(
                    "unexpected answer to snapshot: {:?}",
                    other
                ))
                .into())
            }
        }
    }
}

/// Applies a plan. See [`apply_until`].
pub async fn apply(
    job: &SyncJob,
    sessions: &mut [Session],
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    apply_until(job, sessions, options, CancellationToken::new()).await
}

/// Applies a plan with one worker per session until done, timed out or
/// `cancel`led.
///
/// Operations not carried out are reported as failed. Sessions that were
/// interrupted mid-operation are abandoned. Fails as a whole only when no
/// work could start at all.
pub async fn apply_until(
    job: &SyncJob,
    sessions: &mut [Session],
    options: &SyncOptions,
    cancel: CancellationToken,
) -> Result<SyncReport, SyncError> {
    let started = Instant::now();
    let plan = &job.plan;
    let direction = plan.direction;
    if !sessions.iter().any(Session::is_ready) {
        return Err(SyncError::NoSession);
    }
    let context = OpContext {
        direction,
        local: LocalTree::new(&job.local_root, &job.local_caps),
        remote_root: job.remote_root.clone(),
        rename: match &job.layout {
            Layout::Entry { source, name } if source != name => {
                Some((name.clone(), source.clone()))
            }
            _ => None,
        },
        request_timeout: sessions
            .first()
            .map(|s| s.config().request_timeout)
            .unwrap_or(Duration::from_secs(30)),
    };
    if !plan.is_empty() || job.replace_root {
        prepare_destination(&context, job.replace_root, sessions).await?;
    }

    let labels = plan
        .ops
        .iter()
        .map(|op| (op.action.name(), op.path.clone()))
        .collect();
    let scheduler = Scheduler::new(&plan.dependencies(), labels);
    let stop = cancel.child_token();
    let deadline = options.run_timeout.map(|t| started + t);
    let timer = options.run_timeout.map(|after| {
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            stop.cancel();
        })
    });

    let interrupted = || match (options.run_timeout, deadline) {
        (Some(after), Some(deadline)) if Instant::now() >= deadline => SyncError::TimedOut(after),
        _ if stop.is_cancelled() => SyncError::Cancelled,
        _ => SyncError::NoSession,
    };

    let progress = options.progress.as_ref();
    if let Some(progress) = progress {
        progress.start(plan.len() as u64, plan.summary().bytes);
    }
    let shared = Shared {
        plan,
        scheduler: &scheduler,
        context: &context,
        stop: &stop,
        progress,
    };
    let shared = &shared;
    let interrupted_ref = &interrupted;
    let workers = sessions
        .iter_mut()
        .enumerate()
        .map(move |(n, session)| worker(n, session, shared, interrupted_ref));
    join_all(workers).await;
    if let Some(timer) = timer {
        timer.abort();
    }
    if let Some(progress) = progress {
        progress.finish();
    }

    let outcomes = scheduler.into_outcomes(&interrupted);
    let report = build_report(plan, outcomes, started.elapsed());
    info!(
        "{}: {} succeeded, {} failed, {} issues in {:?}",
        direction,
        report.succeeded.len(),
        report.failed.len(),
        report.issues.len(),
        report.elapsed
    );

    if let Some(store) = options.state.as_ref().filter(|_| !job.cleared) {
        let state = updated_base(job, &report);
        if let Err(e) = store.save(&state) {
            warn!("base state not saved: {}", e);
        }
    }
    Ok(report)
}

async fn prepare_destination(
    context: &OpContext,
    replace: bool,
    sessions: &mut [Session],
) -> Result<(), SyncError> {
    if replace {
        info!("replacing destination root with a directory");
    }
    match context.direction.destination() {
        Side::Local if replace => context.local.replace_root().map_err(SyncError::local),
        Side::Local => context.local.ensure_root().map_err(SyncError::local),
        Side::Remote => {
            let session = sessions
                .iter_mut()
                .find(|s| s.is_ready())
                .ok_or(SyncError::NoSession)?;
            session
                .request(RequestOp::PrepareRoot {
                    root: context.remote_root.clone(),
                    replace,
                })
                .await
                .map(|_| ())
                .map_err(SyncError::session)
        }
    }
}

/// What the workers of one run share.
struct Shared<'a> {
    plan: &'a SyncPlan,
    scheduler: &'a Scheduler,
    context: &'a OpContext,
    stop: &'a CancellationToken,
    progress: Option<&'a SyncProgress>,
}

async fn worker(
    n: usize,
    session: &mut Session,
    shared: &Shared<'_>,
    interrupted: &impl Fn() -> SyncError,
) {
    let Shared {
        plan,
        scheduler,
        context,
        stop,
        progress,
    } = *shared;
    loop {
        if stop.is_cancelled() || !session.is_ready() {
            break;
        }
        let changed = scheduler.notify().notified();
        let index = match scheduler.next() {
            Next::Done => break,
            Next::Wait => {
                tokio::select! {
                    _ = changed => continue,
                    _ = stop.cancelled() => break,
                }
            }
            Next::Run(index) => index,
        };
        let Some(op) = plan.ops.get(index) else {
            scheduler.complete(index, Err(SyncError::NoSession));
            continue;
        };
        let outcome = tokio::select! {
            outcome = context.execute(session, op) => outcome,
            _ = stop.cancelled() => Err(interrupted()),
        };
        if matches!(outcome, Err(SyncError::TimedOut(_) | SyncError::Cancelled)) {
            // The request may be half done; the stream state is unknown.
            session.abandon().await;
        }
        match &outcome {
            Ok(_) => debug!("worker {}: {} done", n, op),
            Err(e) => warn!("worker {}: {} failed: {}", n, op, e),
        }
        if let Some(progress) = progress {
            progress.advance(*outcome.as_ref().unwrap_or(&0));
        }
        scheduler.complete(index, outcome);
    }
    debug!("worker {} finished", n);
}

fn build_report(
    plan: &SyncPlan,
    outcomes: Vec<scheduler::Outcome>,
    elapsed: Duration,
) -> SyncReport {
    let side = plan.direction.destination();
    let mut stats = SyncStats::default();
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (op, outcome) in plan.ops.iter().zip(outcomes) {
        match outcome {
            Ok(bytes) => {
                stats.add(op, bytes);
                succeeded.push(CompletedOp {
                    path: op.path.clone(),
                    action: op.action.name(),
                    side,
                    bytes,
                });
            }
            Err(error) => {
                stats.failed += 1;
                failed.push(FailedOp {
                    path: op.path.clone(),
                    action: op.action.name(),
                    side,
                    error,
                });
            }
        }
    }
    SyncReport {
        direction: plan.direction,
        succeeded,
        failed,
        issues: plan.issues.clone(),
        stats,
        elapsed,
    }
}

/// The base state after a run.
///
/// Paths that failed or that the planner left alone keep what they had;
/// every other source entry is now on both sides, and anything not in the
/// source is forgotten.
fn updated_base(job: &SyncJob, report: &SyncReport) -> BaseState {
    let case_sensitive = job.plan.case_sensitive;
    let key = |path: &RelPath| {
        if case_sensitive {
            path.as_str().to_string()
        } else {
            path.fold_key()
        }
    };

    let mut held: HashSet<String> = report.failed.iter().map(|f| key(&f.path)).collect();
    for issue in &report.issues {
        match issue {
            PlanIssue::CaseCollision { paths } => held.extend(paths.iter().map(&key)),
            other => held.extend(other.path().map(&key)),
        }
    }
    let is_held = |path: &RelPath| {
        held.contains(&key(path)) || path.ancestors().iter().any(|a| held.contains(&key(a)))
    };
    let in_source: HashSet<String> = job.source.iter().map(|r| key(&r.path)).collect();

    let mut state = job
        .base
        .clone()
        .unwrap_or_else(|| BaseState::new(job.state_key.clone()));
    state.retain(|path| match RelPath::new(path) {
        Ok(path) => is_held(&path) || in_source.contains(&key(&path)),
        Err(_) => false,
    });
    for record in job.source.iter() {
        if !is_held(&record.path) {
            state.record(record);
        }
    }
    state.touch();
    debug!("base state now has {} entries", state.len());
    state
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
