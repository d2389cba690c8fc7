// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cs-peer: serves crossync sessions over TCP or WebSocket.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use cs_core::{Endpoint, OsFamily};
use cs_peer::PeerConfig;

#[derive(Parser, Debug)]
#[command(name = "cs-peer", version)]
#[command(about = "Serve crossync sessions for file sync and remote commands")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:7711")]
    bind: SocketAddr,

    /// Speak WebSocket instead of raw TCP
    #[arg(long)]
    websocket: bool,

    /// Confine every request to this directory
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = PeerConfig::new(Endpoint::new(args.bind.to_string(), OsFamily::current()));
    if let Some(root) = &args.root {
        std::fs::create_dir_all(root)?;
        config = config.with_jail(root.canonicalize()?);
    }

    info!("starting cs-peer on {}", config.endpoint);
    if let Some(jail) = &config.jail {
        info!("  root: {}", jail.display());
    }

    let listener = TcpListener::bind(args.bind).await?;
    cs_peer::run(listener, config, args.websocket).await?;
    Ok(())
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
