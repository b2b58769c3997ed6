//! Text rendering for shell responses.

use super::command::COMMANDS;
use crate::registry::{ServiceSnapshot, ServiceStatus};
use crate::router::FilterSet;
use crate::supervisor::{ActionReport, Outcome, ShutdownReport, format_age};
use crate::ui::icons::{CHECK, CROSS, STOP};
use chrono::{DateTime, Local};
use console::style;
use std::time::Duration;

pub fn help_lines() -> Vec<String> {
    let mut lines = vec!["Commands:".to_string()];
    for (name, aliases, description) in COMMANDS {
        let names = std::iter::once(*name)
            .chain(aliases.iter().copied())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("  {:<24} {}", names, description));
    }
    lines.push(String::new());
    lines.push(
        "Services are matched by partial name, e.g. 'buyer api' matches buyer-frontend and api."
            .to_string(),
    );
    lines
}

/// `1h02m`, `3m05s`, `12s`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    match secs {
        s if s >= 3600 => format!("{}h{:02}m", s / 3600, (s % 3600) / 60),
        s if s >= 60 => format!("{}m{:02}s", s / 60, s % 60),
        s => format!("{}s", s),
    }
}

fn styled_status(status: ServiceStatus) -> String {
    let text = format!("{:<10}", status);
    match status {
        ServiceStatus::Ready => style(text).green().to_string(),
        ServiceStatus::Failed => style(text).red().to_string(),
        ServiceStatus::Starting | ServiceStatus::Restarting => style(text).yellow().to_string(),
        ServiceStatus::Pending | ServiceStatus::Stopped => style(text).dim().to_string(),
    }
}

fn rule(name_width: usize, widths: &[usize]) -> String {
    let mut line = format!("+{}", "-".repeat(name_width + 2));
    for w in widths {
        line.push_str(&format!("+{}", "-".repeat(w + 2)));
    }
    line.push('+');
    line
}

fn name_width(snapshots: &[ServiceSnapshot]) -> usize {
    snapshots
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max(7)
}

/// The `status` table.
pub fn status_table(snapshots: &[ServiceSnapshot], filter: &FilterSet) -> Vec<String> {
    let width = name_width(snapshots);
    let rule = rule(width, &[7, 10, 8, 7]);
    let mut lines = vec![
        rule.clone(),
        format!(
            "| {:>width$} | {:>7} | {:<10} | {:>8} | {:<7} |",
            "SERVICE", "PID", "STATUS", "UPTIME", "LOGS"
        ),
        rule.clone(),
    ];

    for snap in snapshots {
        let pid = snap.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        let uptime = snap.uptime.map(format_uptime).unwrap_or_else(|| "-".to_string());
        let logs = if filter.allows(&snap.name) {
            style(format!("{:<7}", "visible")).green().to_string()
        } else {
            style(format!("{:<7}", "hidden")).red().to_string()
        };
        let mut line = format!(
            "| {:>width$} | {:>7} | {} | {:>8} | {} |",
            snap.name,
            pid,
            styled_status(snap.status),
            uptime,
            logs
        );
        if let Some(failure) = &snap.failure {
            line.push_str(&format!(" ({})", failure));
        } else if let (ServiceStatus::Stopped, Some(code)) = (snap.status, snap.last_exit_code) {
            line.push_str(&format!(" (exit code {})", code));
        }
        lines.push(line);
    }
    lines.push(rule);
    lines
}

/// The `branch` table.
pub fn branch_table(snapshots: &[ServiceSnapshot], now: DateTime<Local>) -> Vec<String> {
    let width = name_width(snapshots);
    let branch_width = snapshots
        .iter()
        .filter_map(|s| s.branch.as_ref().map(|b| b.branch.len()))
        .max()
        .unwrap_or(0)
        .max(7);
    let age_width = 14;
    let rule = rule(width, &[branch_width, age_width]);
    let mut lines = vec![
        rule.clone(),
        format!(
            "| {:>width$} | {:<branch_width$} | {:<age_width$} |",
            "SERVICE", "BRANCH", "LAST COMMIT"
        ),
        rule.clone(),
    ];
    for snap in snapshots {
        let branch = snap
            .branch
            .as_ref()
            .map(|b| b.branch.clone())
            .unwrap_or_else(|| "unknown".to_string());
        lines.push(format!(
            "| {:>width$} | {:<branch_width$} | {:<age_width$} |",
            snap.name,
            branch,
            format_age(snap.branch.as_ref(), now)
        ));
    }
    lines.push(rule);
    lines
}

/// One line per service touched by a command.
pub fn report_lines(report: &ActionReport) -> Vec<String> {
    let mut lines = Vec::new();
    for o in &report.outcomes {
        let text = match &o.outcome {
            Outcome::Ready => format!("{}{} is up", CHECK, o.service),
            Outcome::Failed(reason) => format!("{}{} failed: {}", CROSS, o.service, reason),
            Outcome::Stopped { forced: false } => format!("{}{} taken down", STOP, o.service),
            Outcome::Stopped { forced: true } => {
                format!("{}{} taken down (forced after grace period)", STOP, o.service)
            }
            Outcome::AlreadyDown => format!("{} has no running process, already down", o.service),
            Outcome::BuildStarted => format!("Frontend build started for {}", o.service),
            Outcome::Skipped(why) => format!("{} skipped: {}", o.service, why),
        };
        lines.push(text);
    }
    if !report.unmatched.is_empty() {
        lines.push(format!(
            "No service matches {}",
            report.unmatched.join(", ")
        ));
    }
    lines
}

/// Summary printed once start-up finishes.
pub fn startup_lines(report: &ActionReport) -> Vec<String> {
    if report.all_ready() {
        vec![format!(
            "{}All services up and running: {}",
            CHECK,
            report.ready().join(" ")
        )]
    } else {
        vec![format!(
            "{}Some services did not come up: {}. Use 'restart' or 'rebuild' once fixed.",
            CROSS,
            report.failed().join(" ")
        )]
    }
}

pub fn shutdown_lines(report: &ShutdownReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.stopped.is_empty() {
        lines.push("No services were running.".to_string());
    } else {
        lines.push(format!("Stopped {}", report.stopped.join(" ")));
    }
    if !report.forced.is_empty() {
        lines.push(format!(
            "Forced kill needed for: {}",
            report.forced.join(" ")
        ));
    }
    lines
}
