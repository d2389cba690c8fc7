// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! crossync - file synchronization and remote commands across operating
//! systems.
//!
//! This crate is the boss side of a crossync session: it dials a `cs-peer`,
//! negotiates capabilities, and then plans and applies syncs or runs
//! commands over that session.
//!
//! # Main Components
//!
//! - [`transport`] - Framed connections over TCP, WebSocket or any stream
//! - [`session`] - Negotiation and the ordered request stream
//! - [`exec`] - Remote commands with streamed, normalized output
//! - [`engine`] - Sync planning and parallel apply
//! - [`harness`] - In-process peers and the genuine-peer switch for tests
//!
//! # Running a sync
//!
//! ```rust,ignore
//! use crossync::engine::{self, SyncOptions};
//! use crossync::session::{Session, SessionConfig};
//!
//! let address = "winbox".parse()?;
//! let mut session = Session::connect(&address, Endpoint::local(), &Default::default(), SessionConfig::default()).await?;
//! let options = SyncOptions::new(Direction::LocalToRemote);
//! let job = engine::plan(Path::new("/home/me/proj"), "C:\\work\\proj", &mut session, &options).await?;
//! let report = engine::apply(&job, std::slice::from_mut(&mut session), &options).await?;
//! ```

mod cli;
pub mod colors;
mod commands;
mod display;
pub mod help;

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod exec;
pub mod harness;
pub mod location;
pub mod normalize;
pub mod progress;
pub mod session;
pub mod transport;

pub use cli::{Cli, Command, ConnectArgs, ExecArgs, OutputFormat, PingArgs, SyncArgs};
pub use commands::Outcome;
pub use error::{Error, Result};

use clap::CommandFactory;
use clap_complete::generate;

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(command: Command) -> Result<Outcome> {
    if let Command::Completions { shell } = command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "crossync", &mut std::io::stdout());
        return Ok(Outcome::Success);
    }
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(std::io::Error::other(format!("tokio: {}", e))))?;
    runtime.block_on(run_async(command))
}

async fn run_async(command: Command) -> Result<Outcome> {
    match command {
        Command::Sync(args) => commands::sync::run(args).await,
        Command::Exec(args) => commands::exec::run(args).await,
        Command::Ping(args) => commands::ping::run(args).await,
        Command::Completions { .. } => Ok(Outcome::Success),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
