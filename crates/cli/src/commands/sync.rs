// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `crossync sync`: plan and apply one or more syncs.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cs_core::{Direction, StateStore};

use super::{load_settings, print_lines, Connector, Outcome};
use crate::cli::{OutputFormat, SyncArgs};
use crate::colors;
use crate::config::{RemoteSettings, SyncEntry};
use crate::display::{format_plan, format_report, format_stats, PlanJson, ReportJson};
use crate::engine::{self, SyncOptions, TerminalConfirm};
use crate::error::{Error, Result};
use crate::location::{Location, RemoteLocation};
use crate::progress::SyncProgress;

/// A sync entry resolved against the file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub direction: Direction,
    /// Absolute, so the base state key does not depend on the working
    /// directory.
    pub local_root: PathBuf,
    pub remote: RemoteLocation,
    /// The destination ends in a separator, so a single source file
    /// lands inside it.
    pub into_dir: bool,
}

/// Works out which side is remote.
pub fn resolve(entry: &SyncEntry) -> Result<Resolved> {
    let src: Location = entry.src.parse()?;
    let dest: Location = entry.dest.parse()?;
    let (direction, local, remote) = match (src, dest) {
        (Location::Local(local), Location::Remote(remote)) => {
            (Direction::LocalToRemote, local, remote)
        }
        (Location::Remote(remote), Location::Local(local)) => {
            (Direction::RemoteToLocal, local, remote)
        }
        _ => return Err(Error::NeedOneRemote),
    };
    if let Some(user) = &remote.user {
        debug!("ignoring user name '{}': peers do not authenticate", user);
    }
    Ok(Resolved {
        direction,
        local_root: std::path::absolute(&local)?,
        remote,
        into_dir: entry.dest.ends_with(['/', '\\']),
    })
}

/// The syncs to run: the command-line pair, else the spec file's entries,
/// with command-line flags layered on top.
pub fn entries(args: &SyncArgs, spec_entries: Vec<SyncEntry>) -> Result<Vec<SyncEntry>> {
    let mut entries = match (&args.src, &args.dest) {
        (Some(src), Some(dest)) => vec![SyncEntry {
            src: src.clone(),
            dest: dest.clone(),
            filters: Vec::new(),
            symlinks: Default::default(),
            delete: true,
            overwrite_conflicts: false,
            dest_entry_needs_deleting: None,
            dest_root_needs_deleting: None,
        }],
        _ => spec_entries,
    };
    if entries.is_empty() {
        return Err(Error::NothingToSync);
    }
    for entry in &mut entries {
        if !args.filter.is_empty() {
            entry.filters = args.filter.clone();
        }
        if let Some(symlinks) = args.symlinks {
            entry.symlinks = symlinks;
        }
        if args.no_delete {
            entry.delete = false;
        }
        if args.overwrite_conflicts {
            entry.overwrite_conflicts = true;
        }
        let mut policies = entry.destructive();
        if let Some(all) = args.all_destructive_behaviour {
            policies = policies.with_all(all);
        }
        if let Some(policy) = args.dest_entry_needs_deleting {
            policies.entry = policy;
        }
        if let Some(policy) = args.dest_root_needs_deleting {
            policies.root = policy;
        }
        entry.dest_entry_needs_deleting = Some(policies.entry);
        entry.dest_root_needs_deleting = Some(policies.root);
    }
    Ok(entries)
}

pub async fn run(args: SyncArgs) -> Result<Outcome> {
    let spec = load_settings(&args.connect)?;
    let entries = entries(&args, spec.sync)?;
    let store = if args.no_state {
        None
    } else {
        Some(StateStore::from_env()?)
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; stopping after in-flight operations");
            on_interrupt.cancel();
        }
    });

    let mut outcome = Outcome::Success;
    for entry in &entries {
        if cancel.is_cancelled() {
            break;
        }
        if sync_one(entry, &spec.remote, &args, store.clone(), &cancel).await? {
            outcome = Outcome::Partial;
        }
    }
    interrupt.abort();
    Ok(outcome)
}

/// Runs one sync; returns whether it left paths unconverged.
async fn sync_one(
    entry: &SyncEntry,
    remote: &RemoteSettings,
    args: &SyncArgs,
    state: Option<StateStore>,
    cancel: &CancellationToken,
) -> Result<bool> {
    let resolved = resolve(entry)?;
    let connector = Connector::new(
        Some(&resolved.remote.host),
        remote,
        args.connect.loopback,
    )?;
    let mut options = SyncOptions {
        direction: resolved.direction,
        filters: entry.filters.clone(),
        symlinks: entry.symlinks,
        delete_extraneous: entry.delete,
        overwrite_conflicts: entry.overwrite_conflicts,
        into_dir: resolved.into_dir,
        state,
        run_timeout: args
            .timeout
            .map(Duration::from_secs)
            .or_else(|| remote.run_timeout()),
        progress: None,
    };
    let title = format!("{} -> {}", entry.src, entry.dest);
    let color = args.output == OutputFormat::Text && colors::should_colorize();

    let mut first = connector.open().await?;
    let planned = engine::plan(&resolved.local_root, &resolved.remote.path, &mut first, &options)
        .await
        .and_then(|mut job| {
            engine::guard(&mut job, &entry.destructive(), &mut TerminalConfirm)?;
            Ok(job)
        });
    let job = match planned {
        Ok(job) => job,
        Err(e) => {
            first.close().await;
            return Err(e.into());
        }
    };

    if args.dry_run {
        first.close().await;
        match args.output {
            OutputFormat::Text => print_lines(&format_plan(&title, &job.plan, color)),
            OutputFormat::Json => print_json(&PlanJson {
                src: &entry.src,
                dest: &entry.dest,
                plan: &job.plan,
            })?,
        }
        return Ok(false);
    }

    let mut sessions = vec![first];
    let wanted = args.jobs.get().min(job.plan.len()).max(1);
    while sessions.len() < wanted {
        match connector.open().await {
            Ok(session) => sessions.push(session),
            Err(e) => {
                warn!("running with {} sessions: {}", sessions.len(), e);
                break;
            }
        }
    }
    info!("applying {} with {} session(s) to {}", title, sessions.len(), connector);
    if !args.no_progress && args.output == OutputFormat::Text {
        options.progress = Some(SyncProgress::stderr());
    }

    let applied = engine::apply_until(&job, &mut sessions, &options, cancel.clone()).await;
    for session in &mut sessions {
        session.close().await;
    }
    let report = applied?;

    match args.output {
        OutputFormat::Text => {
            print_lines(&format_report(&title, &report, color));
            if args.stats {
                print_lines(&format_stats(&report.stats));
            }
        }
        OutputFormat::Json => print_json(&ReportJson::new(&entry.src, &entry.dest, &report))?,
    }
    Ok(report.is_partial())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let line = serde_json::to_string(value).map_err(std::io::Error::other)?;
    println!("{}", line);
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
