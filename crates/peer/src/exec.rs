// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command execution for `Exec` requests.
//!
//! Output is forwarded as data frames while the child runs. Forwarding
//! waits on the outgoing queue, so a client that stops reading stalls the
//! child once its pipes fill up.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use cs_proto::{DataStream, Message, RemoteError, RemoteErrorKind, ResponseBody};

use crate::error::{PeerError, Result};
use crate::link::Link;

const OUTPUT_CHUNK: usize = 8 * 1024;

pub(crate) struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

/// Runs a command to completion, cancellation or timeout.
///
/// A cancel that arrives after the child exited does not change the
/// outcome: the real exit status is reported.
pub(crate) async fn run(link: &mut Link, id: u64, invocation: Invocation) -> Result<ResponseBody> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Ok(ResponseBody::Failed {
                error: RemoteError::new(
                    RemoteErrorKind::SpawnFailed,
                    format!("failed to start '{}': {}", invocation.program, e),
                ),
            })
        }
    };
    debug!("#{} started {} (pid {:?})", id, invocation.program, child.id());

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut out_buf = vec![0u8; OUTPUT_CHUNK];
    let mut err_buf = vec![0u8; OUTPUT_CHUNK];
    let deadline = invocation.timeout.map(|t| Instant::now() + t);
    let mut status: Option<ExitStatus> = None;
    let mut cancelled = false;
    let mut timed_out = false;

    while status.is_none() || stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_some(&mut stdout, &mut out_buf) => match read {
                Ok(0) => stdout = None,
                Ok(n) => {
                    let bytes = out_buf[..n].to_vec();
                    link.send(Message::data(id, DataStream::Stdout, bytes)).await?;
                }
                Err(e) => {
                    warn!("#{} stdout: {}", id, e);
                    stdout = None;
                }
            },
            read = read_some(&mut stderr, &mut err_buf) => match read {
                Ok(0) => stderr = None,
                Ok(n) => {
                    let bytes = err_buf[..n].to_vec();
                    link.send(Message::data(id, DataStream::Stderr, bytes)).await?;
                }
                Err(e) => {
                    warn!("#{} stderr: {}", id, e);
                    stderr = None;
                }
            },
            waited = child.wait(), if status.is_none() => status = Some(waited?),
            message = link.recv() => match message {
                Some(Message::Cancel(cancel)) if cancel.id == id => {
                    if status.is_some() || cancelled {
                        debug!("#{} cancel arrived after exit", id);
                    } else if let Some(exited) = exited_or_kill(&mut child, id) {
                        status = Some(exited);
                    } else {
                        cancelled = true;
                    }
                }
                Some(Message::Cancel(cancel)) => debug!("ignoring cancel for #{}", cancel.id),
                Some(other) => {
                    return Err(PeerError::Protocol(format!(
                        "{} while #{} is running",
                        other.describe(),
                        id
                    )))
                }
                None => return Err(PeerError::Closed),
            },
            _ = sleep_until(deadline), if status.is_none() && !timed_out => {
                warn!("#{} timed out", id);
                timed_out = true;
                kill(&mut child, id);
            }
        }
    }

    let exit_code = status.and_then(|s| s.code());
    if timed_out && !cancelled {
        let after = invocation.timeout.unwrap_or_default();
        return Ok(ResponseBody::Failed {
            error: RemoteError::new(
                RemoteErrorKind::TimedOut,
                format!("'{}' timed out after {:?}", invocation.program, after),
            ),
        });
    }
    debug!("#{} exited with {:?} (cancelled: {})", id, exit_code, cancelled);
    Ok(ResponseBody::Exited {
        exit_code,
        cancelled,
    })
}

/// Stops a child on cancel. A child that already exited is reaped instead
/// and its status returned; output may still be buffered behind it.
fn exited_or_kill(child: &mut Child, id: u64) -> Option<ExitStatus> {
    match child.try_wait() {
        Ok(Some(exited)) => {
            debug!("#{} cancel arrived after exit ({})", id, exited);
            Some(exited)
        }
        Ok(None) => {
            info!("#{} cancelled", id);
            kill(child, id);
            None
        }
        Err(e) => {
            warn!("#{} could not be polled: {}", id, e);
            kill(child, id);
            None
        }
    }
}

fn kill(child: &mut Child, id: u64) {
    if let Err(e) = child.start_kill() {
        warn!("#{} could not be killed: {}", id, e);
    }
}

async fn read_some<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
