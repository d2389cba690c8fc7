// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use std::collections::{HashMap, HashSet};

/// Only allowed long-form flags have short forms, every short form maps to
/// its expected long form, and every allowed short form is used.
#[test]
fn test_flag_consistency() {
    use clap::CommandFactory;

    let allowed: HashMap<char, &str> = [
        ('v', "verbose"),
        ('q', "quiet"),
        ('p', "port"),
        ('f', "filter"),
        ('n', "dry-run"),
        ('j', "jobs"),
        ('o', "output"),
    ]
    .into_iter()
    .collect();

    let cmd = Cli::command();
    let mut errors = Vec::new();
    let mut used_shorts = HashSet::new();

    check_command_flags(&cmd, &allowed, &mut errors, &mut used_shorts);

    for (short_char, long_name) in &allowed {
        if !used_shorts.contains(short_char) {
            errors.push(format!(
                "-{} (--{}) is in allowed set but never used",
                short_char, long_name
            ));
        }
    }

    if !errors.is_empty() {
        panic!("Flag consistency violations:\n{}", errors.join("\n"));
    }
}

fn check_command_flags(
    cmd: &clap::Command,
    allowed: &HashMap<char, &str>,
    errors: &mut Vec<String>,
    used_shorts: &mut HashSet<char>,
) {
    let cmd_name = cmd.get_name();

    for arg in cmd.get_arguments() {
        let long = arg.get_long();
        let Some(short_char) = arg.get_short() else {
            continue;
        };
        // Clap's own help and version flags
        if (short_char == 'h' && long == Some("help")) || (short_char == 'V' && long == Some("version")) {
            continue;
        }
        used_shorts.insert(short_char);

        match (allowed.get(&short_char), long) {
            (Some(expected), Some(actual)) if actual != *expected => errors.push(format!(
                "{}: -{} maps to --{} but should map to --{}",
                cmd_name, short_char, actual, expected
            )),
            (Some(expected), None) => errors.push(format!(
                "{}: -{} has no long form, expected --{}",
                cmd_name, short_char, expected
            )),
            (None, long) => errors.push(format!(
                "{}: -{} (--{}) is not an allowed short flag",
                cmd_name,
                short_char,
                long.unwrap_or("(none)")
            )),
            _ => {}
        }
    }

    for subcmd in cmd.get_subcommands() {
        check_command_flags(subcmd, allowed, errors, used_shorts);
    }
}

#[test]
fn test_cli_is_well_formed() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn test_verbose_counts() {
    let cli = parse(&["crossync", "-vv", "ping", "box"]).unwrap();
    assert_eq!(cli.verbose, 2);
    assert!(!cli.quiet);
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    assert!(parse(&["crossync", "-v", "-q", "ping", "box"]).is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = parse(&["crossync", "ping", "box", "--quiet"]).unwrap();
    assert!(cli.quiet);
}

#[test]
fn test_completions_shell() {
    let cli = parse(&["crossync", "completions", "bash"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Completions {
            shell: clap_complete::Shell::Bash
        }
    ));
}
