// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Help text generation with colorization support.

use crate::colors;
use clap::builder::styling::Styles;

/// Clap styles matching the report colors.
pub fn styles() -> Styles {
    if !colors::should_colorize() {
        return Styles::plain();
    }

    use anstyle::{Ansi256Color, Color, Style};

    let fg = |code| Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(code))));
    let header = fg(colors::codes::HEADER);
    let context = fg(colors::codes::CONTEXT);

    Styles::styled()
        .header(header)
        .usage(header)
        .literal(fg(colors::codes::LITERAL))
        .placeholder(context)
        .valid(context)
        .error(fg(colors::codes::FAILURE))
        .invalid(fg(colors::codes::ISSUE))
}

/// Main help template with colorized Options header.
pub fn template() -> String {
    format!(
        "{{about-with-newline}}
{{usage-heading}} {{usage}}

{{before-help}}{}
{{options}}{{after-help}}",
        colors::header("Options:")
    )
}

/// Commands list shown before options in main help.
pub fn commands() -> String {
    format!(
        "\
{header}
  {sync}         Make a destination tree match a source tree
  {exec}         Run a command on a peer
  {ping}         Check that a peer answers
  {completions}  Generate shell completions
",
        header = colors::header("Commands:"),
        sync = colors::literal("sync"),
        exec = colors::literal("exec"),
        ping = colors::literal("ping"),
        completions = colors::literal("completions"),
    )
}

/// Examples shown after options in main help.
pub fn quickstart() -> String {
    colors::examples(
        "\
Examples:
  crossync ping winbox                            Check the peer on winbox
  crossync sync ./proj winbox:C:\\work\\proj        Push a tree to winbox
  crossync sync winbox:C:\\logs ./logs             Pull a tree from winbox
  crossync exec winbox -- cmd /c ver              Run a command on winbox",
    )
}

#[cfg(test)]
#[path = "help_tests.rs"]
mod tests;
