//! Counters for silent-degradation paths.
//!
//! Every fallback (empty output, absent channel, zero reading, re-queried
//! registration) bumps one of these so the behavior stays testable without
//! turning it into an error.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared degradation counters. Cheap to bump from any thread.
#[derive(Debug, Default)]
pub struct Diagnostics {
    command_timeouts: AtomicU64,
    command_failures: AtomicU64,
    invalid_utf8: AtomicU64,
    config_unavailable: AtomicU64,
    log_unavailable: AtomicU64,
    resource_unparsable: AtomicU64,
    autostart_failures: AtomicU64,
    notification_failures: AtomicU64,
    polls_completed: AtomicU64,
    polls_suppressed: AtomicU64,
}

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    CommandTimeout,
    CommandFailure,
    InvalidUtf8,
    ConfigUnavailable,
    LogUnavailable,
    ResourceUnparsable,
    AutostartFailure,
    NotificationFailure,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub command_timeouts: u64,
    pub command_failures: u64,
    pub invalid_utf8: u64,
    pub config_unavailable: u64,
    pub log_unavailable: u64,
    pub resource_unparsable: u64,
    pub autostart_failures: u64,
    pub notification_failures: u64,
    pub polls_completed: u64,
    pub polls_suppressed: u64,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: Degradation) {
        let counter = match kind {
            Degradation::CommandTimeout => &self.command_timeouts,
            Degradation::CommandFailure => &self.command_failures,
            Degradation::InvalidUtf8 => &self.invalid_utf8,
            Degradation::ConfigUnavailable => &self.config_unavailable,
            Degradation::LogUnavailable => &self.log_unavailable,
            Degradation::ResourceUnparsable => &self.resource_unparsable,
            Degradation::AutostartFailure => &self.autostart_failures,
            Degradation::NotificationFailure => &self.notification_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_completed(&self) {
        self.polls_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_suppressed(&self) {
        self.polls_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            command_timeouts: self.command_timeouts.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
            invalid_utf8: self.invalid_utf8.load(Ordering::Relaxed),
            config_unavailable: self.config_unavailable.load(Ordering::Relaxed),
            log_unavailable: self.log_unavailable.load(Ordering::Relaxed),
            resource_unparsable: self.resource_unparsable.load(Ordering::Relaxed),
            autostart_failures: self.autostart_failures.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            polls_completed: self.polls_completed.load(Ordering::Relaxed),
            polls_suppressed: self.polls_suppressed.load(Ordering::Relaxed),
        }
    }
}
