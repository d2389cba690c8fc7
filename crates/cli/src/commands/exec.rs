// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `crossync exec`: run a command on a peer, streaming its output.

use std::io::Write;
use std::time::Duration;

use tracing::warn;

use super::{load_settings, Connector, Outcome};
use crate::cli::ExecArgs;
use crate::error::Result;
use crate::exec::{
    execute, CommandResult, CommandStatus, Invocation, OutputChunk, OutputStream,
    DEFAULT_CANCEL_GRACE,
};

/// Exit code reported when the command was cancelled (128 + SIGINT).
const CANCELLED_EXIT_CODE: i32 = 130;

/// Builds the invocation from `PROGRAM ARGS...`.
pub fn invocation(args: &ExecArgs) -> Option<Invocation> {
    let (program, rest) = args.command.split_first()?;
    let mut invocation = Invocation::new(program.as_str()).args(rest.iter());
    if let Some(cwd) = &args.cwd {
        invocation = invocation.cwd(cwd.as_str());
    }
    if let Some(secs) = args.timeout {
        invocation = invocation.timeout(Duration::from_secs(secs));
    }
    Some(invocation)
}

/// The process exit code mirroring the remote command.
pub fn exit_outcome(result: &CommandResult) -> Outcome {
    match result.status {
        CommandStatus::Completed { exit_code: Some(0) } => Outcome::Success,
        CommandStatus::Completed { exit_code: Some(code) } => Outcome::Code(code),
        CommandStatus::Completed { exit_code: None } => Outcome::Code(1),
        CommandStatus::Cancelled => Outcome::Code(CANCELLED_EXIT_CODE),
    }
}

pub async fn run(args: ExecArgs) -> Result<Outcome> {
    let spec = load_settings(&args.connect)?;
    let Some(invocation) = invocation(&args) else {
        return Ok(Outcome::Code(1));
    };
    let connector = Connector::new(args.host.as_deref(), &spec.remote, args.connect.loopback)?;
    let mut session = connector.open().await?;

    let mut running = execute(&mut session, &invocation).await?;
    let interrupted = loop {
        tokio::select! {
            chunk = running.next_chunk() => match chunk? {
                Some(chunk) => write_chunk(&chunk)?,
                None => break false,
            },
            _ = tokio::signal::ctrl_c() => break true,
        }
    };
    let result = if interrupted {
        warn!("interrupted; cancelling '{}'", invocation.program);
        let result = running.cancel(DEFAULT_CANCEL_GRACE).await?;
        write_chunk(&OutputChunk {
            stream: OutputStream::Stdout,
            data: result.stdout.clone(),
        })?;
        write_chunk(&OutputChunk {
            stream: OutputStream::Stderr,
            data: result.stderr.clone(),
        })?;
        result
    } else {
        running.finish().await?
    };
    session.close().await;
    Ok(exit_outcome(&result))
}

fn write_chunk(chunk: &OutputChunk) -> std::io::Result<()> {
    if chunk.data.is_empty() {
        return Ok(());
    }
    match chunk.stream {
        OutputStream::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(&chunk.data)?;
            out.flush()
        }
        OutputStream::Stderr => {
            let mut err = std::io::stderr().lock();
            err.write_all(&chunk.data)?;
            err.flush()
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
