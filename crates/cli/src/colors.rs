// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal colors for help and report output.
//!
//! Respects environment variables:
//! - `NO_COLOR=1`: Disables colors
//! - `COLOR=1`: Forces colors even without TTY

use std::io::IsTerminal;

use crate::env;

/// ANSI 256-color codes.
pub mod codes {
    /// Section headers: pastel cyan/steel blue
    pub const HEADER: u8 = 74;
    /// Commands/literals: light grey
    pub const LITERAL: u8 = 250;
    /// Defaults, hints, secondary detail: medium grey
    pub const CONTEXT: u8 = 245;
    /// Failed operations: soft red
    pub const FAILURE: u8 = 167;
    /// Plan issues: muted amber
    pub const ISSUE: u8 = 179;

    pub const RESET: &str = "\x1b[0m";
}

/// Check if colors should be enabled based on TTY and environment variables.
pub fn should_colorize() -> bool {
    if env::no_color() {
        return false;
    }
    if env::force_color() {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

fn paint(code: u8, text: &str) -> String {
    format!("{}{}{}", fg256(code), text, codes::RESET)
}

/// Apply header color (section titles) to text.
pub fn header(text: &str) -> String {
    paint(codes::HEADER, text)
}

/// Apply literal color (commands, options, paths) to text.
pub fn literal(text: &str) -> String {
    paint(codes::LITERAL, text)
}

/// Apply context color (default values, hints) to text.
pub fn context(text: &str) -> String {
    paint(codes::CONTEXT, text)
}

pub fn failure(text: &str) -> String {
    paint(codes::FAILURE, text)
}

pub fn issue(text: &str) -> String {
    paint(codes::ISSUE, text)
}

/// Colorize an examples help block.
///
/// Lines ending with `:` are headers; in `command  description` lines the
/// command is a literal and `<placeholders>` are context.
pub fn examples(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len() + 256);
    for line in text.lines() {
        if !result.is_empty() {
            result.push('\n');
        }
        let trimmed = line.trim_start();
        let indent = &line[..line.len() - trimmed.len()];

        if trimmed.ends_with(':') && !trimmed.contains("  ") {
            result.push_str(indent);
            result.push_str(&header(trimmed));
        } else if let Some(cmd_end) = find_description_start(trimmed) {
            result.push_str(indent);
            result.push_str(&colorize_command(&trimmed[..cmd_end]));
            result.push_str(&trimmed[cmd_end..]);
        } else {
            result.push_str(line);
        }
    }
    result
}

/// Colorize a command line: placeholders like `<path>` as context, the
/// rest as literal.
pub fn colorize_command(cmd: &str) -> String {
    let mut result = String::with_capacity(cmd.len() + 64);
    let mut rest = cmd;
    while let Some(start) = rest.find('<') {
        let end = rest[start..]
            .find('>')
            .map(|offset| start + offset + 1)
            .unwrap_or(rest.len());
        if start > 0 {
            result.push_str(&literal(&rest[..start]));
        }
        result.push_str(&context(&rest[start..end]));
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        result.push_str(&literal(rest));
    }
    result
}

/// Find where the description starts (at 2+ spaces following the command).
pub fn find_description_start(line: &str) -> Option<usize> {
    let start = line.find("  ")?;
    let tail = &line[start..];
    if tail.trim_start().is_empty() {
        None
    } else {
        Some(start)
    }
}

#[cfg(test)]
#[path = "colors_tests.rs"]
mod tests;
