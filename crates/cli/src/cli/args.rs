// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Argument structs for CLI commands.
//!
//! [`ConnectArgs`] is flattened into every command that talks to a peer.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Args;
use cs_core::SymlinkPolicy;

use super::OutputFormat;
use crate::engine::DeletePolicy;

/// How to reach the peer. Overrides the spec file's `[remote]` table.
#[derive(Args, Clone, Debug, Default)]
pub struct ConnectArgs {
    /// Spec file with `[remote]` settings and `[[sync]]` entries
    #[arg(long, value_name = "FILE")]
    pub spec: Option<PathBuf>,

    /// Peer port
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Speak WebSocket instead of raw TCP
    #[arg(long)]
    pub websocket: bool,

    /// Seconds allowed for connecting
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: Option<u64>,

    /// Seconds allowed for each request
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout: Option<u64>,

    /// Use an in-process peer on this machine instead of dialing the host
    #[arg(long)]
    pub loopback: bool,
}

#[derive(Args, Clone, Debug)]
pub struct SyncArgs {
    /// Source location: path or [user@]host:path
    #[arg(requires = "dest")]
    pub src: Option<String>,

    /// Destination location: path or [user@]host:path
    pub dest: Option<String>,

    /// Include (+regex) or exclude (-regex) rule; the last match wins
    #[arg(long, short = 'f', value_name = "RULE", allow_hyphen_values = true)]
    pub filter: Vec<String>,

    /// Print the plan without changing anything
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Keep destination entries that are absent from the source
    #[arg(long)]
    pub no_delete: bool,

    /// What to do with symbolic links (follow, skip, preserve)
    #[arg(long, value_name = "POLICY")]
    pub symlinks: Option<SymlinkPolicy>,

    /// Let the source win when both sides changed since the last sync
    #[arg(long)]
    pub overwrite_conflicts: bool,

    /// Deleting an entry inside the destination (prompt, error, skip, delete)
    #[arg(long, value_name = "POLICY")]
    pub dest_entry_needs_deleting: Option<DeletePolicy>,

    /// Deleting or replacing the destination root (prompt, error, skip, delete)
    #[arg(long, value_name = "POLICY")]
    pub dest_root_needs_deleting: Option<DeletePolicy>,

    /// Policy for every kind of deletion not set to skip
    #[arg(long, value_name = "POLICY")]
    pub all_destructive_behaviour: Option<DeletePolicy>,

    /// Do not read or write the remembered state of earlier syncs
    #[arg(long)]
    pub no_state: bool,

    /// Parallel sessions used to apply the plan
    #[arg(long, short = 'j', default_value = "1")]
    pub jobs: NonZeroUsize,

    /// Seconds allowed for applying each sync
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print transfer statistics
    #[arg(long)]
    pub stats: bool,

    /// Do not draw a progress bar while applying
    #[arg(long)]
    pub no_progress: bool,

    /// Output format (text, json)
    #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Clone, Debug)]
pub struct ExecArgs {
    /// Peer host (defaults to the spec file's host)
    pub host: Option<String>,

    /// Working directory on the peer
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<String>,

    /// Seconds before the peer kills the command
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Program and arguments
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Clone, Debug)]
pub struct PingArgs {
    /// Peer host (defaults to the spec file's host)
    pub host: Option<String>,

    #[command(flatten)]
    pub connect: ConnectArgs,
}
