//! Terminal and JSON rendering for `gwmon` command output.
//!
//! Every command that observes the gateway renders one [`StatusReport`]:
//! the published snapshot plus control flags, counters, and the dashboard
//! address. Human output is colorized; `--json` emits the same report as a
//! single JSON document.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;

use crate::core::diagnostics::DiagnosticsSnapshot;
use crate::core::snapshot::{ControlFlags, HealthStatus, Snapshot};
use crate::daemon::autostart::AutostartFlavor;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Structured status for display and `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// The snapshot being reported, flattened into the JSON object.
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// Seconds since `started_at`, computed at render time.
    pub uptime_seconds: Option<i64>,
    /// In-flight operation flags at render time.
    pub flags: ControlFlags,
    /// Local dashboard address.
    pub dashboard_url: String,
    /// Degradation counters for this invocation.
    pub diagnostics: DiagnosticsSnapshot,
}

impl StatusReport {
    /// Report for `snapshot` as seen at `now`.
    #[must_use]
    pub fn new(
        snapshot: &Snapshot,
        flags: ControlFlags,
        dashboard_url: &str,
        diagnostics: DiagnosticsSnapshot,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            uptime_seconds: snapshot.uptime_seconds(now),
            snapshot: snapshot.clone(),
            flags,
            dashboard_url: dashboard_url.to_string(),
            diagnostics,
        }
    }
}

/// `1h 02m 03s`, `4m 05s`, or `6s`.
#[must_use]
pub fn format_uptime(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

fn health_label(status: HealthStatus) -> colored::ColoredString {
    match status {
        HealthStatus::Unknown => status.label().dimmed(),
        HealthStatus::Healthy => status.label().green(),
        HealthStatus::Warnings => status.label().yellow(),
        HealthStatus::IssuesFound => status.label().red().bold(),
    }
}

/// Multi-line human status. `log_lines` controls whether the log tail is
/// included.
#[must_use]
pub fn format_status_report(report: &StatusReport, log_lines: bool) -> String {
    let snap = &report.snapshot;
    let mut out = String::new();

    let state = if snap.running {
        "running".green().bold()
    } else {
        "stopped".red().bold()
    };
    let _ = writeln!(out, "Gateway:   {state}");
    if let Some(pid) = snap.pid {
        let _ = writeln!(out, "  PID:     {pid}");
    }
    if let Some(uptime) = report.uptime_seconds {
        let _ = writeln!(out, "  Uptime:  {}", format_uptime(uptime));
    }
    if snap.running {
        let _ = writeln!(
            out,
            "  CPU:     {:.1}%   MEM: {:.1}%",
            snap.cpu_percent, snap.mem_percent
        );
    }
    let version = if snap.version.is_empty() {
        "unknown"
    } else {
        snap.version.as_str()
    };
    let _ = writeln!(out, "  Version: {version}");

    if report.flags.restart_in_progress {
        let _ = writeln!(out, "  {}", "restart in progress".yellow());
    }
    if report.flags.health_check_in_progress {
        let _ = writeln!(out, "  {}", "health check in progress".yellow());
    }

    out.push('\n');
    if snap.channels.is_empty() {
        let _ = writeln!(out, "Channels:  {}", "none configured".dimmed());
    } else {
        let _ = writeln!(out, "Channels:");
        for channel in &snap.channels {
            let mark = if channel.enabled {
                "on".green()
            } else {
                "off".dimmed()
            };
            let _ = writeln!(out, "  {:<10} {mark}", channel.name);
        }
    }

    let _ = writeln!(out, "\nHealth:    {}", health_label(snap.health_status));
    for line in &snap.health_details {
        let _ = writeln!(out, "  {line}");
    }

    if log_lines && !snap.log_lines.is_empty() {
        let _ = writeln!(out, "\nRecent log:");
        for line in &snap.log_lines {
            let _ = writeln!(out, "  {line}");
        }
    }

    let _ = writeln!(out, "\nDashboard: {}", report.dashboard_url);
    if let Some(at) = snap.last_checked_at {
        let _ = writeln!(out, "Checked:   {}", at.format("%Y-%m-%d %H:%M:%S"));
    }
    out
}

/// One-line status for `watch`.
#[must_use]
pub fn format_status_line(snap: &Snapshot, now: DateTime<Local>) -> String {
    let stamp = snap
        .last_checked_at
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    if snap.running {
        let uptime = snap.uptime_seconds(now).map(format_uptime).unwrap_or_default();
        format!(
            "[{stamp}] {} pid={} up={uptime} cpu={:.1}% mem={:.1}% health={}",
            "running".green(),
            snap.pid.unwrap_or_default(),
            snap.cpu_percent,
            snap.mem_percent,
            snap.health_status
        )
    } else {
        format!(
            "[{stamp}] {} health={}",
            "stopped".red(),
            snap.health_status
        )
    }
}

// ---------------------------------------------------------------------------
// Autostart
// ---------------------------------------------------------------------------

/// Result of an `autostart` subcommand.
#[derive(Debug, Clone, Serialize)]
pub struct AutostartReport {
    /// `enable`, `disable`, or `status`.
    pub action: &'static str,
    /// Service manager targeted.
    pub flavor: AutostartFlavor,
    /// Descriptor location.
    pub marker_path: PathBuf,
    /// Registration state re-read after the action.
    pub registered: bool,
}

/// Human rendering of an [`AutostartReport`].
#[must_use]
pub fn format_autostart_report(report: &AutostartReport) -> String {
    let state = if report.registered {
        "enabled".green().bold()
    } else {
        "disabled".dimmed()
    };
    format!(
        "Autostart ({}): {state}\n  Descriptor: {}\n",
        report.flavor,
        report.marker_path.display()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
