// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote command execution.
//!
//! [`execute`] starts a command on the peer and returns a
//! [`RunningCommand`] whose output is pulled chunk by chunk. Frames are
//! only read when the caller asks for the next chunk, so a slow consumer
//! stalls the peer's output channel instead of growing a buffer here.

use std::time::Duration;

use tracing::{debug, info, warn};

use cs_proto::{DataStream, RemoteError, RemoteErrorKind, RequestOp, ResponseBody};

use crate::normalize::{Conversion, LineNormalizer};
use crate::session::{Reply, Session, SessionError};

/// Default wait for the final status after a cancel.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(2);

/// A command to run on the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory on the peer.
    pub cwd: Option<String>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn to_request(&self) -> RequestOp {
        RequestOp::Exec {
            program: self.program.clone(),
            args: self.args.clone(),
            cwd: self.cwd.clone(),
            timeout_ms: self
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// Failures that prevent a command from completing.
///
/// A command that ran and exited non-zero is not an error.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("cannot start '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("'{program}' timed out: {message}")]
    TimedOut { program: String, message: String },

    #[error("'{program}' refused by the peer: {error}")]
    Refused { program: String, error: RemoteError },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub data: Vec<u8>,
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The command exited; `None` when it was killed by a signal.
    Completed { exit_code: Option<i32> },
    Cancelled,
}

/// Collected output and final status of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandResult {
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            CommandStatus::Completed { exit_code } => exit_code,
            CommandStatus::Cancelled => None,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Starts `invocation` on the session's peer.
pub async fn execute<'s>(
    session: &'s mut Session,
    invocation: &Invocation,
) -> Result<RunningCommand<'s>, ExecutionError> {
    let conversion = Conversion::between(
        session.remote().capabilities.line_ending,
        session.local().capabilities.line_ending,
    );
    // The peer enforces the command timeout; wait a little longer for its
    // report before giving up on the session.
    let wait = invocation
        .timeout
        .map(|t| t + session.config().request_timeout);
    let id = session.begin(invocation.to_request()).await?;
    info!("started '{}' as #{} on {}", invocation.program, id, session.remote().address);
    Ok(RunningCommand {
        session,
        id,
        program: invocation.program.clone(),
        wait,
        stdout: LineNormalizer::new(conversion),
        stderr: LineNormalizer::new(conversion),
        flushed: Vec::new(),
        status: None,
    })
}

/// Runs `invocation` and collects its output.
pub async fn run_to_completion(
    session: &mut Session,
    invocation: &Invocation,
) -> Result<CommandResult, ExecutionError> {
    execute(session, invocation).await?.finish().await
}

/// A command in progress on the peer.
///
/// Output is a finite sequence: once [`RunningCommand::next_chunk`] has
/// returned `None` the command is over and cannot be restarted.
pub struct RunningCommand<'s> {
    session: &'s mut Session,
    id: u64,
    program: String,
    wait: Option<Duration>,
    stdout: LineNormalizer,
    stderr: LineNormalizer,
    /// Held-back bytes released at the end of the stream.
    flushed: Vec<OutputChunk>,
    status: Option<CommandStatus>,
}

impl RunningCommand<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The next chunk of output, or `None` once the command has ended.
    pub async fn next_chunk(&mut self) -> Result<Option<OutputChunk>, ExecutionError> {
        loop {
            if self.status.is_some() {
                return Ok(self.flushed.pop());
            }
            let reply = self.session.next_reply(self.id, self.wait).await?;
            if let Some(chunk) = self.accept(reply)? {
                return Ok(Some(chunk));
            }
        }
    }

    /// Drains the remaining output and returns the result.
    pub async fn finish(mut self) -> Result<CommandResult, ExecutionError> {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        while let Some(chunk) = self.next_chunk().await? {
            match chunk.stream {
                OutputStream::Stdout => stdout.extend(chunk.data),
                OutputStream::Stderr => stderr.extend(chunk.data),
            }
        }
        Ok(CommandResult {
            status: self.status.unwrap_or(CommandStatus::Cancelled),
            stdout,
            stderr,
        })
    }

    /// Asks the peer to stop the command and waits up to `grace` for its
    /// final status.
    ///
    /// A command that finished before the cancel arrived reports its real
    /// exit status. Without an answer in time the command is abandoned,
    /// reported as cancelled, and the session is closed.
    pub async fn cancel(mut self, grace: Duration) -> Result<CommandResult, ExecutionError> {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        if self.status.is_none() {
            self.session.send_cancel(self.id).await?;
            debug!("cancel sent for #{}", self.id);
        }
        let deadline = tokio::time::Instant::now() + grace;
        while self.status.is_none() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let reply = match self.session.next_reply(self.id, Some(remaining)).await {
                Ok(reply) => reply,
                Err(SessionError::Timeout { .. }) => {
                    warn!(
                        "no answer to cancel of #{} within {:?}; abandoning",
                        self.id, grace
                    );
                    self.session.abandon().await;
                    self.status = Some(CommandStatus::Cancelled);
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(chunk) = self.accept(reply)? {
                match chunk.stream {
                    OutputStream::Stdout => stdout.extend(chunk.data),
                    OutputStream::Stderr => stderr.extend(chunk.data),
                }
            }
        }
        for chunk in self.flushed.drain(..).rev() {
            match chunk.stream {
                OutputStream::Stdout => stdout.extend(chunk.data),
                OutputStream::Stderr => stderr.extend(chunk.data),
            }
        }
        Ok(CommandResult {
            status: self.status.unwrap_or(CommandStatus::Cancelled),
            stdout,
            stderr,
        })
    }

    /// Takes in one reply; returns a chunk worth handing out.
    fn accept(&mut self, reply: Reply) -> Result<Option<OutputChunk>, ExecutionError> {
        match reply {
            Reply::Data(DataStream::Stdout, bytes) => {
                Ok(chunk(OutputStream::Stdout, self.stdout.push(&bytes)))
            }
            Reply::Data(DataStream::Stderr, bytes) => {
                Ok(chunk(OutputStream::Stderr, self.stderr.push(&bytes)))
            }
            Reply::Data(stream, bytes) => {
                warn!("ignoring {} {:?} bytes sent for #{}", bytes.len(), stream, self.id);
                Ok(None)
            }
            Reply::Done(ResponseBody::Exited {
                exit_code,
                cancelled,
            }) => {
                let status = if cancelled {
                    CommandStatus::Cancelled
                } else {
                    CommandStatus::Completed { exit_code }
                };
                debug!("#{} ended: {:?}", self.id, status);
                self.status = Some(status);
                // Popped from the back: stderr is handed out after stdout.
                self.flushed.extend(chunk(OutputStream::Stderr, self.stderr.finish()));
                self.flushed.extend(chunk(OutputStream::Stdout, self.stdout.finish()));
                Ok(None)
            }
            Reply::Done(ResponseBody::Failed { error }) => {
                self.status = Some(CommandStatus::Cancelled);
                let program = self.program.clone();
                Err(match error.kind {
                    RemoteErrorKind::SpawnFailed => ExecutionError::Spawn {
                        program,
                        message: error.message,
                    },
                    RemoteErrorKind::TimedOut => ExecutionError::TimedOut {
                        program,
                        message: error.message,
                    },
                    _ => ExecutionError::Refused { program, error },
                })
            }
            Reply::Done(other) => {
                self.status = Some(CommandStatus::Cancelled);
                Err(SessionError::Protocol(format!(
                    "unexpected answer to exec #{}: {:?}",
                    self.id, other
                ))
                .into())
            }
        }
    }
}

fn chunk(stream: OutputStream, data: Vec<u8>) -> Option<OutputChunk> {
    if data.is_empty() {
        None
    } else {
        Some(OutputChunk { stream, data })
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
