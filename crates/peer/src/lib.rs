// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cs-peer: the serving side of a crossync session.
//!
//! The peer answers file and command requests against its own file system.
//! It can be run as the `cs-peer` binary or embedded, e.g. over an
//! in-memory pipe for tests.

pub mod config;
pub mod error;
mod exec;
mod handler;
mod link;
pub mod server;
mod transfer;

pub use config::PeerConfig;
pub use error::{PeerError, Result};
pub use server::{run, serve_stream, serve_websocket};
