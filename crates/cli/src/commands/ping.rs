// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `crossync ping`: negotiate with a peer and show what it is.

use std::time::Instant;

use cs_proto::{RequestOp, ResponseBody, PROTOCOL_VERSION};

use super::{load_settings, print_lines, Connector, Outcome};
use crate::cli::PingArgs;
use crate::colors;
use crate::display::{format_endpoint, format_row};
use crate::error::Result;
use crate::session::SessionError;

pub async fn run(args: PingArgs) -> Result<Outcome> {
    let spec = load_settings(&args.connect)?;
    let connector = Connector::new(args.host.as_deref(), &spec.remote, args.connect.loopback)?;

    let started = Instant::now();
    let mut session = connector.open().await?;
    let negotiated = started.elapsed();

    let sent = Instant::now();
    let answer = session.request(RequestOp::Ping).await;
    let round_trip = sent.elapsed();
    let remote = session.remote().clone();
    session.close().await;
    match answer? {
        ResponseBody::Pong => {}
        other => {
            return Err(SessionError::Protocol(format!("unexpected answer to ping: {:?}", other)).into())
        }
    }

    let color = colors::should_colorize();
    let mut lines = format_endpoint(&remote, color);
    lines.push(format_row("protocol", &PROTOCOL_VERSION.to_string(), color));
    lines.push(format_row("negotiated in", &millis(negotiated), color));
    lines.push(format_row("round trip", &millis(round_trip), color));
    print_lines(&lines);
    Ok(Outcome::Success)
}

fn millis(elapsed: std::time::Duration) -> String {
    format!("{:.1} ms", elapsed.as_secs_f64() * 1000.0)
}
