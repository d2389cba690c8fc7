// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

use crate::cli::ConnectArgs;

fn args(command: &[&str]) -> ExecArgs {
    ExecArgs {
        host: Some("box".to_string()),
        cwd: None,
        timeout: None,
        command: command.iter().map(|s| s.to_string()).collect(),
        connect: ConnectArgs::default(),
    }
}

#[test]
fn invocation_splits_program_and_args() {
    let mut exec = args(&["cmd", "/c", "dir"]);
    exec.cwd = Some("C:\\work".to_string());
    exec.timeout = Some(5);
    let invocation = invocation(&exec).unwrap();
    assert_eq!(invocation.program, "cmd");
    assert_eq!(invocation.args, vec!["/c", "dir"]);
    assert_eq!(invocation.cwd.as_deref(), Some("C:\\work"));
    assert_eq!(invocation.timeout, Some(Duration::from_secs(5)));
}

#[test]
fn empty_command_has_no_invocation() {
    assert!(invocation(&args(&[])).is_none());
}

fn result(status: CommandStatus) -> CommandResult {
    CommandResult {
        status,
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

#[parameterized(
    zero = { CommandStatus::Completed { exit_code: Some(0) }, Outcome::Success },
    nonzero = { CommandStatus::Completed { exit_code: Some(42) }, Outcome::Code(42) },
    signalled = { CommandStatus::Completed { exit_code: None }, Outcome::Code(1) },
    cancelled = { CommandStatus::Cancelled, Outcome::Code(130) },
)]
fn outcome_mirrors_status(status: CommandStatus, expected: Outcome) {
    assert_eq!(exit_outcome(&result(status)), expected);
}
