//! Published view of observed gateway state.
//!
//! A [`Snapshot`] is never mutated once published: each poll cycle or control
//! operation builds a complete replacement.

#![allow(missing_docs)]

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent explicit health check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No health check has completed yet.
    #[default]
    Unknown,
    Healthy,
    Warnings,
    IssuesFound,
}

impl HealthStatus {
    /// Classify free-text diagnostic output.
    ///
    /// Case-insensitive substring search in priority order: "error" or "fail"
    /// anywhere wins over "warn"; anything else is healthy. Incidental matches
    /// (e.g. "0 errors") are misclassified and that is accepted.
    #[must_use]
    pub fn classify(output: &str) -> Self {
        let lower = output.to_lowercase();
        if lower.contains("error") || lower.contains("fail") {
            Self::IssuesFound
        } else if lower.contains("warn") {
            Self::Warnings
        } else {
            Self::Healthy
        }
    }

    /// Short label for human output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Warnings => "warnings",
            Self::IssuesFound => "issues found",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One messaging channel from the gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Display name (e.g. `WhatsApp`).
    pub name: String,
    pub enabled: bool,
}

impl Channel {
    #[must_use]
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}

/// Complete, internally consistent view of the gateway at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub running: bool,
    /// Present iff `running`.
    pub pid: Option<u32>,
    /// When `running` was first observed true; present iff `running`.
    /// Not the OS process start time.
    pub started_at: Option<DateTime<Local>>,
    /// Version query output; empty when unavailable.
    pub version: String,
    /// Ordered by fixed channel priority, not configuration order.
    pub channels: Vec<Channel>,
    /// Chronological, most recent last.
    pub log_lines: Vec<String>,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    /// Wall-clock completion time of the producing cycle; `None` before the
    /// first poll.
    pub last_checked_at: Option<DateTime<Local>>,
    pub health_status: HealthStatus,
    pub health_details: Vec<String>,
}

impl Snapshot {
    /// Whether the pid/started_at/resource invariants hold.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let identity = self.pid.is_some() == self.running
            && self.started_at.is_some() == self.running;
        let resources = self.pid.is_some() || (self.cpu_percent == 0.0 && self.mem_percent == 0.0);
        identity && resources
    }

    /// Seconds since the gateway was first observed running.
    #[must_use]
    pub fn uptime_seconds(&self, now: DateTime<Local>) -> Option<i64> {
        self.started_at
            .map(|started| now.signed_duration_since(started).num_seconds().max(0))
    }
}

/// Transient operation flags. Advisory only: they tell a reader that an
/// operation is in flight, they do not lock anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    pub restart_in_progress: bool,
    pub health_check_in_progress: bool,
}
