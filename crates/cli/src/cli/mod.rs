// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod args;

use crate::colors;
use crate::help;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

pub use args::{ConnectArgs, ExecArgs, PingArgs, SyncArgs};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "crossync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Synchronize files and run commands across operating systems")]
#[command(
    long_about = "Synchronize files and run commands across operating systems.\n\n\
    Talks to a cs-peer on the other machine; translates paths, line endings and \
    permissions between the two sides."
)]
#[command(help_template = help::template())]
#[command(before_help = help::commands())]
#[command(after_help = help::quickstart())]
#[command(styles = help::styles())]
pub struct Cli {
    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Make a destination tree match a source tree
    #[command(after_help = colors::examples("\
Examples:
  crossync sync ./proj winbox:C:\\work\\proj          Push, deleting extraneous files
  crossync sync winbox:C:\\logs ./logs --no-delete   Pull, keeping local extras
  crossync sync ./proj box:/srv/proj -f '-target/'   Skip build output
  crossync sync ./proj box:/srv/proj --dry-run       Show the plan only
  crossync sync --spec sync.toml                     Run every [[sync]] in a file"))]
    Sync(SyncArgs),

    /// Run a command on a peer
    #[command(after_help = colors::examples("\
Examples:
  crossync exec winbox -- cmd /c dir              List a directory on winbox
  crossync exec box --cwd /srv -- make test       Run tests in /srv
  crossync exec box --timeout 60 -- ./long.sh     Give up after a minute"))]
    Exec(ExecArgs),

    /// Check that a peer answers and show what it is
    Ping(PingArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
