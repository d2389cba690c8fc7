// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Text and JSON rendering of plans, reports and endpoints.

use serde::Serialize;

use cs_core::{
    Action, Endpoint, LineEnding, NameRules, PermissionModel, PlanIssue, Side, SyncOp, SyncPlan,
};

use crate::colors;
use crate::engine::{CompletedOp, SyncReport, SyncStats};

/// Width of the action column.
const ACTION_WIDTH: usize = 16;

/// Applies a color only when coloring is on.
fn paint(color: bool, style: fn(&str) -> String, text: &str) -> String {
    if color {
        style(text)
    } else {
        text.to_string()
    }
}

/// Human-readable byte count: `512 B`, `1.5 KiB`, `3.0 MiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn format_op(op: &SyncOp, color: bool) -> String {
    let action = format!("{:<width$}", op.action.name(), width = ACTION_WIDTH);
    let path = paint(color, colors::literal, op.path.as_str());
    match &op.action {
        Action::CreateFile { .. } | Action::UpdateFile { .. } => format!(
            "  {}{} {}",
            action,
            path,
            paint(
                color,
                colors::context,
                &format!("({})", format_bytes(op.action.transfer_size()))
            )
        ),
        Action::CreateSymlink { target } => format!(
            "  {}{} {}",
            action,
            path,
            paint(color, colors::context, &format!("-> {}", target))
        ),
        _ => format!("  {}{}", action, path),
    }
}

fn format_issue(issue: &PlanIssue, color: bool) -> String {
    format!("  {}", paint(color, colors::issue, &issue.to_string()))
}

/// The plan of one sync, one line per operation and issue.
pub fn format_plan(title: &str, plan: &SyncPlan, color: bool) -> Vec<String> {
    let summary = plan.summary();
    let mut lines = vec![format!(
        "{} {}",
        paint(color, colors::header, title),
        paint(
            color,
            colors::context,
            &format!(
                "({} operations, {} to transfer)",
                plan.len(),
                format_bytes(summary.bytes)
            )
        )
    )];
    if plan.is_empty() && plan.issues.is_empty() {
        lines.push("  up to date".to_string());
    }
    lines.extend(plan.ops.iter().map(|op| format_op(op, color)));
    lines.extend(plan.issues.iter().map(|issue| format_issue(issue, color)));
    lines
}

/// The outcome of one sync: failures and issues, then a summary line.
pub fn format_report(title: &str, report: &SyncReport, color: bool) -> Vec<String> {
    let mut lines = vec![paint(color, colors::header, title)];
    for failed in &report.failed {
        lines.push(format!("  {}", paint(color, colors::failure, &failed.to_string())));
    }
    lines.extend(report.issues.iter().map(|issue| format_issue(issue, color)));
    lines.push(format!(
        "  {} succeeded, {} failed, {} issues, {} in {:.1}s",
        report.succeeded.len(),
        report.failed.len(),
        report.issues.len(),
        format_bytes(report.stats.bytes_transferred),
        report.elapsed.as_secs_f64()
    ));
    lines
}

/// Transfer statistics, skipping zero counts.
pub fn format_stats(stats: &SyncStats) -> Vec<String> {
    let counts = [
        ("files created", stats.files_created),
        ("files updated", stats.files_updated),
        ("files deleted", stats.files_deleted),
        ("dirs created", stats.dirs_created),
        ("dirs deleted", stats.dirs_deleted),
        ("symlinks created", stats.symlinks_created),
        ("symlinks deleted", stats.symlinks_deleted),
        ("permissions set", stats.permissions_set),
        ("failed", stats.failed),
    ];
    let mut lines: Vec<String> = counts
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| format!("  {:<18}{}", label, count))
        .collect();
    lines.push(format!(
        "  {:<18}{}",
        "transferred",
        format_bytes(stats.bytes_transferred)
    ));
    lines
}

/// An indented `label  value` line.
pub fn format_row(label: &str, value: &str, color: bool) -> String {
    let padded = format!("{:<16}", label);
    format!("  {}{}", paint(color, colors::context, &padded), value)
}

/// A peer's identity and capabilities.
pub fn format_endpoint(endpoint: &Endpoint, color: bool) -> Vec<String> {
    let caps = &endpoint.capabilities;
    let row = |label: &str, value: String| format_row(label, &value, color);
    vec![
        paint(color, colors::header, &endpoint.to_string()),
        row("separator", caps.path_separator.to_string()),
        row(
            "case",
            if caps.case_sensitive {
                "sensitive".to_string()
            } else {
                "insensitive".to_string()
            },
        ),
        row(
            "line endings",
            match caps.line_ending {
                LineEnding::Lf => "lf".to_string(),
                LineEnding::Crlf => "crlf".to_string(),
            },
        ),
        row(
            "permissions",
            match caps.permissions {
                PermissionModel::UnixMode => "unix mode".to_string(),
                PermissionModel::ReadOnlyFlag => "read-only flag".to_string(),
            },
        ),
        row("symlinks", yes_no(caps.symlinks)),
        row(
            "names",
            match caps.name_rules {
                NameRules::Posix => "posix".to_string(),
                NameRules::Windows => "windows".to_string(),
            },
        ),
    ]
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

/// JSON form of a [`SyncReport`].
#[derive(Debug, Serialize)]
pub struct ReportJson<'a> {
    pub src: &'a str,
    pub dest: &'a str,
    pub direction: String,
    pub succeeded: &'a [CompletedOp],
    pub failed: Vec<FailedJson<'a>>,
    pub issues: &'a [PlanIssue],
    pub stats: SyncStats,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct FailedJson<'a> {
    pub path: &'a str,
    pub action: &'static str,
    pub side: Side,
    pub error: String,
}

impl<'a> ReportJson<'a> {
    pub fn new(src: &'a str, dest: &'a str, report: &'a SyncReport) -> Self {
        ReportJson {
            src,
            dest,
            direction: report.direction.to_string(),
            succeeded: &report.succeeded,
            failed: report
                .failed
                .iter()
                .map(|f| FailedJson {
                    path: f.path.as_str(),
                    action: f.action,
                    side: f.side,
                    error: f.error.to_string(),
                })
                .collect(),
            issues: &report.issues,
            stats: report.stats,
            elapsed_ms: report.elapsed.as_millis(),
        }
    }
}

/// JSON form of a dry run.
#[derive(Debug, Serialize)]
pub struct PlanJson<'a> {
    pub src: &'a str,
    pub dest: &'a str,
    pub plan: &'a SyncPlan,
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
