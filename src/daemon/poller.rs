//! The status poller: single writer of the published [`Snapshot`], driver of
//! edge-triggered notifications, and home of the control operations.
//!
//! Concurrency rules:
//! - At most one poll cycle runs at a time. The timer path uses
//!   [`StatusPoller::try_poll`] and is suppressed while a cycle is in flight;
//!   control operations use [`StatusPoller::poll`] and queue behind it.
//! - Start, stop, and restart are serialized through a control gate, so a
//!   manual stop cannot interleave with a restart's stop/start pair.
//! - Health checks are independent of the control gate.
//! - Every publish replaces the snapshot under one write lock, so readers
//!   never see a partially updated value and subscribers receive publishes
//!   in commit order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::core::config::Config;
use crate::core::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::core::errors::{GwError, Result};
use crate::core::snapshot::{ControlFlags, HealthStatus, Snapshot};
use crate::daemon::notifications::NotificationSink;
use crate::monitor::channels::ConfigReader;
use crate::monitor::logs::LogReader;
use crate::monitor::probe::{ProcessProbe, VersionQuery};
use crate::monitor::resources::{ResourceSample, ResourceSampler};
use crate::platform::CommandRunner;

/// Timing and command settings the poller needs from [`Config`].
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Launched detached by `start`.
    pub start_command: String,
    /// Run through the bounded runner by `stop`.
    pub stop_command: String,
    /// Diagnostic command whose output `run_health_check` classifies.
    pub health_command: String,
    pub dashboard_url: String,
    /// Log lines carried in each snapshot.
    pub max_log_lines: usize,
    /// Output lines kept as health details.
    pub health_detail_lines: usize,
    /// Longest wait for the process to appear after `start`.
    pub start_grace: Duration,
    /// Longest wait for the process to vanish after `stop`.
    pub stop_grace: Duration,
    /// Spacing of liveness checks inside a grace period.
    pub settle_probe: Duration,
}

impl PollerSettings {
    /// Copy the poller's share of the loaded settings.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_command: config.gateway.start_command.clone(),
            stop_command: config.gateway.stop_command.clone(),
            health_command: config.gateway.health_command.clone(),
            dashboard_url: config.gateway.dashboard_url.clone(),
            max_log_lines: config.poll.max_log_lines,
            health_detail_lines: config.poll.health_detail_lines,
            start_grace: config.poll.start_grace(),
            stop_grace: config.poll.stop_grace(),
            settle_probe: config.poll.settle_probe(),
        }
    }
}

/// Control operations that can be run on their own thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    /// [`StatusPoller::start`].
    Start,
    /// [`StatusPoller::stop`].
    Stop,
    /// [`StatusPoller::restart`].
    Restart,
    /// [`StatusPoller::run_health_check`].
    HealthCheck,
}

impl ControlOp {
    const fn thread_name(self) -> &'static str {
        match self {
            Self::Start => "gwmon-start",
            Self::Stop => "gwmon-stop",
            Self::Restart => "gwmon-restart",
            Self::HealthCheck => "gwmon-health",
        }
    }
}

/// What the poller remembers between cycles. Only touched under the poll
/// gate.
#[derive(Debug, Default)]
struct PollMemory {
    running: bool,
    started_at: Option<DateTime<Local>>,
    version: String,
}

/// Sets an advisory flag for the lifetime of the guard. The flag drops back
/// to false on every exit path, including unwinding.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates probe → config → log → resource sampling and owns the
/// published snapshot.
pub struct StatusPoller {
    settings: PollerSettings,
    runner: Arc<dyn CommandRunner>,
    sink: Arc<dyn NotificationSink>,
    diagnostics: Arc<Diagnostics>,
    probe: ProcessProbe,
    version: VersionQuery,
    channels: ConfigReader,
    logs: LogReader,
    resources: ResourceSampler,
    published: RwLock<Arc<Snapshot>>,
    subscribers: Mutex<Vec<Sender<Arc<Snapshot>>>>,
    poll_gate: Mutex<PollMemory>,
    control_gate: Mutex<()>,
    version_stale: AtomicBool,
    restart_in_progress: AtomicBool,
    health_check_in_progress: AtomicBool,
}

impl StatusPoller {
    /// Build a poller from monitor settings. Nothing runs until the first
    /// poll; the published snapshot starts all-default.
    #[must_use]
    pub fn new(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        sink: Arc<dyn NotificationSink>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            settings: PollerSettings::from_config(config),
            probe: ProcessProbe::new(Arc::clone(&runner), config.gateway.process_pattern.clone()),
            version: VersionQuery::new(Arc::clone(&runner), config.gateway.version_command.clone()),
            channels: ConfigReader::new(
                config.paths.gateway_config.clone(),
                Arc::clone(&diagnostics),
            ),
            logs: LogReader::new(
                config.paths.log_dir.clone(),
                config.paths.log_service.clone(),
                config.paths.log_extension.clone(),
                Arc::clone(&diagnostics),
            ),
            resources: ResourceSampler::new(Arc::clone(&runner), Arc::clone(&diagnostics)),
            runner,
            sink,
            diagnostics,
            published: RwLock::new(Arc::new(Snapshot::default())),
            subscribers: Mutex::new(Vec::new()),
            poll_gate: Mutex::new(PollMemory::default()),
            control_gate: Mutex::new(()),
            version_stale: AtomicBool::new(true),
            restart_in_progress: AtomicBool::new(false),
            health_check_in_progress: AtomicBool::new(false),
        }
    }

    // ──────────────────── readers ────────────────────

    /// The most recently published snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.published.read())
    }

    /// Receive every snapshot published from now on, in commit order.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<Arc<Snapshot>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Current in-flight operation flags.
    #[must_use]
    pub fn flags(&self) -> ControlFlags {
        ControlFlags {
            restart_in_progress: self.restart_in_progress.load(Ordering::SeqCst),
            health_check_in_progress: self.health_check_in_progress.load(Ordering::SeqCst),
        }
    }

    /// Degradation counters accumulated so far.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Local dashboard address for the presentation layer. Never fetched here.
    #[must_use]
    pub fn dashboard_url(&self) -> &str {
        &self.settings.dashboard_url
    }

    /// Reader for today's gateway log.
    #[must_use]
    pub const fn logs(&self) -> &LogReader {
        &self.logs
    }

    // ──────────────────── polling ────────────────────

    /// Run one cycle, waiting for any in-flight cycle to finish first.
    pub fn poll(&self) -> Arc<Snapshot> {
        let mut memory = self.poll_gate.lock();
        self.poll_locked(&mut memory)
    }

    /// Run one cycle unless one is already in flight. Used by the timer.
    pub fn try_poll(&self) -> Option<Arc<Snapshot>> {
        let Some(mut memory) = self.poll_gate.try_lock() else {
            self.diagnostics.poll_suppressed();
            tracing::debug!("poll already in flight; tick suppressed");
            return None;
        };
        Some(self.poll_locked(&mut memory))
    }

    fn poll_locked(&self, memory: &mut PollMemory) -> Arc<Snapshot> {
        let pid = self.probe.probe();
        let channels = self.channels.read_channels();
        let log_lines = self.logs.read_tail(self.settings.max_log_lines);
        let sample = pid.map_or_else(ResourceSample::default, |pid| self.resources.sample(pid));

        let stale = self.version_stale.swap(false, Ordering::SeqCst);
        if stale || memory.version.is_empty() {
            memory.version = self.version.query();
        }

        let running = pid.is_some();
        let now = Local::now();
        let changed = running != memory.running;
        let started_at = match (running, changed) {
            (false, _) => None,
            (true, true) => Some(now),
            (true, false) => memory.started_at.or(Some(now)),
        };

        if changed {
            tracing::info!(running, ?pid, "gateway run state transition");
            self.sink.notify(running);
        }

        let version = memory.version.clone();
        let snapshot = self.publish_with(|prev| Snapshot {
            running,
            pid,
            started_at,
            version,
            channels,
            log_lines,
            cpu_percent: sample.cpu_percent,
            mem_percent: sample.mem_percent,
            last_checked_at: Some(now),
            health_status: prev.health_status,
            health_details: prev.health_details.clone(),
        });

        memory.running = running;
        memory.started_at = started_at;
        self.diagnostics.poll_completed();
        debug_assert!(snapshot.is_consistent());
        snapshot
    }

    /// Replace the published snapshot with one derived from the previous
    /// value, then fan it out to subscribers while still holding the lock.
    fn publish_with(&self, build: impl FnOnce(&Snapshot) -> Snapshot) -> Arc<Snapshot> {
        let mut slot = self.published.write();
        let next = Arc::new(build(&**slot));
        *slot = Arc::clone(&next);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(Arc::clone(&next)).is_ok());
        next
    }

    // ──────────────────── control operations ────────────────────

    /// Launch the gateway (fire-and-forget), wait out the start grace period,
    /// then poll. Success is whatever the poll observes.
    pub fn start(&self) -> Arc<Snapshot> {
        let _serialized = self.control_gate.lock();
        self.issue_start();
        self.poll()
    }

    /// Issue the stop command, wait out the stop grace period, then poll.
    pub fn stop(&self) -> Arc<Snapshot> {
        let _serialized = self.control_gate.lock();
        self.issue_stop();
        self.poll()
    }

    /// Stop, then start regardless of whether the stop took effect, then
    /// poll. `restart_in_progress` is raised for the stop/start pair only.
    pub fn restart(&self) -> Arc<Snapshot> {
        let _serialized = self.control_gate.lock();
        {
            let _flag = FlagGuard::raise(&self.restart_in_progress);
            tracing::info!("restarting gateway");
            if !self.issue_stop() {
                tracing::warn!("gateway still running after stop grace; starting anyway");
            }
            self.issue_start();
        }
        self.poll()
    }

    /// Run the diagnostic command and publish its classification.
    pub fn run_health_check(&self) -> Arc<Snapshot> {
        let _flag = FlagGuard::raise(&self.health_check_in_progress);
        let output = self.runner.run(&self.settings.health_command);
        let status = HealthStatus::classify(&output);
        let details: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(self.settings.health_detail_lines)
            .map(str::to_string)
            .collect();
        tracing::info!(status = %status, detail_lines = details.len(), "health check complete");
        self.publish_with(|prev| Snapshot {
            health_status: status,
            health_details: details,
            ..prev.clone()
        })
    }

    /// Dispatch one control operation synchronously.
    pub fn execute(&self, op: ControlOp) -> Arc<Snapshot> {
        match op {
            ControlOp::Start => self.start(),
            ControlOp::Stop => self.stop(),
            ControlOp::Restart => self.restart(),
            ControlOp::HealthCheck => self.run_health_check(),
        }
    }

    /// Run a control operation on its own thread so the caller never waits
    /// on a subprocess.
    pub fn spawn_control(self: &Arc<Self>, op: ControlOp) -> Result<JoinHandle<Arc<Snapshot>>> {
        let poller = Arc::clone(self);
        std::thread::Builder::new()
            .name(op.thread_name().to_string())
            .spawn(move || poller.execute(op))
            .map_err(|e| GwError::Runtime {
                details: format!("failed to spawn {op:?} worker: {e}"),
            })
    }

    fn issue_start(&self) -> bool {
        tracing::info!(command = %self.settings.start_command, "starting gateway");
        self.runner.spawn_detached(&self.settings.start_command);
        self.version_stale.store(true, Ordering::SeqCst);
        self.await_running(true, self.settings.start_grace)
    }

    fn issue_stop(&self) -> bool {
        tracing::info!(command = %self.settings.stop_command, "stopping gateway");
        let output = self.runner.run(&self.settings.stop_command);
        if !output.trim().is_empty() {
            tracing::debug!(output = output.trim(), "stop command output");
        }
        self.await_running(false, self.settings.stop_grace)
    }

    /// Probe until the run state matches `expected` or `grace` elapses.
    /// A heuristic wait, not a guarantee: returns whether the state was seen.
    fn await_running(&self, expected: bool, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if self.probe.probe().is_some() == expected {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(expected, ?grace, "grace period elapsed without observing state");
                return false;
            }
            std::thread::sleep(self.settings.settle_probe.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::ScriptedRunner;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<bool>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<bool> {
            self.events.lock().clone()
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, running: bool) {
            self.events.lock().push(running);
        }
    }

    struct Fixture {
        _tmp: TempDir,
        runner: Arc<ScriptedRunner>,
        sink: Arc<RecordingSink>,
        poller: Arc<StatusPoller>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let mut config = Config::default();
            config.paths.gateway_config = tmp.path().join("openclaw.json");
            config.paths.log_dir = tmp.path().join("logs");
            config.poll.start_grace_ms = 40;
            config.poll.stop_grace_ms = 40;
            config.poll.settle_probe_ms = 5;
            let runner = Arc::new(ScriptedRunner::new());
            let sink = Arc::new(RecordingSink::default());
            let poller = Arc::new(StatusPoller::new(
                &config,
                Arc::clone(&runner) as Arc<dyn CommandRunner>,
                Arc::clone(&sink) as Arc<dyn NotificationSink>,
                Arc::new(Diagnostics::new()),
            ));
            Self {
                _tmp: tmp,
                runner,
                sink,
                poller,
            }
        }

        fn set_running(&self, pid: Option<u32>) {
            self.runner
                .respond("pgrep", &pid.map(|p| format!("{p}\n")).unwrap_or_default());
        }
    }

    #[test]
    fn initial_snapshot_is_default() {
        let fx = Fixture::new();
        assert_eq!(*fx.poller.current(), Snapshot::default());
        assert_eq!(fx.poller.flags(), ControlFlags::default());
    }

    #[test]
    fn pid_present_iff_running_across_transitions() {
        let fx = Fixture::new();
        for pid in [None, Some(10), Some(10), None, Some(11), None] {
            fx.set_running(pid);
            let snap = fx.poller.poll();
            assert_eq!(snap.running, pid.is_some());
            assert_eq!(snap.pid, pid);
            assert!(snap.is_consistent(), "inconsistent snapshot: {snap:?}");
        }
    }

    #[test]
    fn one_notification_per_transition() {
        let fx = Fixture::new();
        fx.set_running(None);
        fx.poller.poll();
        fx.poller.poll();
        assert!(fx.sink.events().is_empty());

        fx.set_running(Some(7));
        fx.poller.poll();
        fx.poller.poll();
        assert_eq!(fx.sink.events(), vec![true]);

        fx.set_running(None);
        fx.poller.poll();
        fx.poller.poll();
        assert_eq!(fx.sink.events(), vec![true, false]);
    }

    #[test]
    fn started_at_survives_steady_polls_and_resets_on_stop() {
        let fx = Fixture::new();
        fx.set_running(Some(5));
        let first = fx.poller.poll();
        let second = fx.poller.poll();
        assert!(first.started_at.is_some());
        assert_eq!(first.started_at, second.started_at);

        fx.set_running(None);
        assert!(fx.poller.poll().started_at.is_none());

        fx.set_running(Some(6));
        let third = fx.poller.poll();
        assert!(third.started_at.unwrap() >= first.started_at.unwrap());
    }

    #[test]
    fn resources_sampled_only_with_pid() {
        let fx = Fixture::new();
        fx.runner.respond("ps -p", "%CPU %MEM\n 12.5 3.0\n");
        fx.set_running(None);
        let stopped = fx.poller.poll();
        assert_eq!(fx.runner.count_containing("ps -p"), 0);
        assert!(stopped.cpu_percent.abs() < f64::EPSILON);

        fx.set_running(Some(99));
        let running = fx.poller.poll();
        assert_eq!(fx.runner.count_containing("ps -p 99"), 1);
        assert!((running.cpu_percent - 12.5).abs() < f64::EPSILON);
        assert!((running.mem_percent - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn probe_runs_before_resource_sampling() {
        let fx = Fixture::new();
        fx.set_running(Some(3));
        fx.poller.poll();
        let calls = fx.runner.calls();
        let probe_idx = calls.iter().position(|c| c.starts_with("pgrep")).unwrap();
        let ps_idx = calls.iter().position(|c| c.starts_with("ps -p")).unwrap();
        assert!(probe_idx < ps_idx);
    }

    #[test]
    fn health_status_survives_polls() {
        let fx = Fixture::new();
        fx.runner.respond("doctor", "warn: slow response\n");
        let checked = fx.poller.run_health_check();
        assert_eq!(checked.health_status, HealthStatus::Warnings);

        fx.set_running(Some(1));
        let polled = fx.poller.poll();
        assert_eq!(polled.health_status, HealthStatus::Warnings);
        assert_eq!(polled.health_details, vec!["warn: slow response".to_string()]);
        assert!(!fx.poller.flags().health_check_in_progress);
    }

    #[test]
    fn health_details_keep_first_ten_nonempty_lines() {
        let fx = Fixture::new();
        let output: String = (1..=15).map(|i| format!("check {i} ok\n\n")).collect();
        fx.runner.respond("doctor", &output);
        let snap = fx.poller.run_health_check();
        assert_eq!(snap.health_status, HealthStatus::Healthy);
        assert_eq!(snap.health_details.len(), 10);
        assert_eq!(snap.health_details[0], "check 1 ok");
        assert_eq!(snap.health_details[9], "check 10 ok");
    }

    #[test]
    fn health_check_does_not_touch_run_state() {
        let fx = Fixture::new();
        fx.set_running(Some(8));
        let polled = fx.poller.poll();
        fx.runner.respond("doctor", "ERROR: disk full\n");
        let checked = fx.poller.run_health_check();
        assert_eq!(checked.health_status, HealthStatus::IssuesFound);
        assert_eq!(checked.pid, polled.pid);
        assert_eq!(checked.started_at, polled.started_at);
    }

    #[test]
    fn restart_without_effect_still_clears_flag() {
        let fx = Fixture::new();
        fx.set_running(Some(20));
        fx.poller.poll();
        let snap = fx.poller.restart();
        assert!(!fx.poller.flags().restart_in_progress);
        assert!(snap.running, "wedged gateway is still observed running");
        assert_eq!(fx.runner.spawned(), vec!["openclaw gateway".to_string()]);
        assert_eq!(fx.runner.count_containing("gateway stop"), 1);
    }

    #[test]
    fn restart_from_stopped_issues_one_stop_and_one_start() {
        let fx = Fixture::new();
        fx.set_running(None);
        let snap = fx.poller.restart();
        assert_eq!(fx.runner.count_containing("gateway stop"), 1);
        assert_eq!(fx.runner.spawned().len(), 1);
        assert!(!snap.running);
    }

    #[test]
    fn restart_flag_visible_while_running() {
        let fx = Fixture::new();
        fx.set_running(Some(4));
        let handle = fx.poller.spawn_control(ControlOp::Restart).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = false;
        while Instant::now() < deadline && !handle.is_finished() {
            if fx.poller.flags().restart_in_progress {
                seen = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.join().unwrap();
        assert!(seen, "restart flag never observed");
        assert!(!fx.poller.flags().restart_in_progress);
    }

    #[test]
    fn start_launches_detached_and_polls() {
        let fx = Fixture::new();
        fx.set_running(Some(31));
        let snap = fx.poller.start();
        assert_eq!(fx.runner.spawned(), vec!["openclaw gateway".to_string()]);
        assert!(snap.running);
        assert_eq!(fx.sink.events(), vec![true]);
    }

    #[test]
    fn stop_polls_after_grace() {
        let fx = Fixture::new();
        fx.set_running(Some(31));
        fx.poller.poll();
        fx.set_running(None);
        let snap = fx.poller.stop();
        assert!(!snap.running);
        assert_eq!(fx.sink.events(), vec![true, false]);
    }

    #[test]
    fn try_poll_is_suppressed_while_cycle_in_flight() {
        let fx = Fixture::new();
        let held = fx.poller.poll_gate.lock();
        assert!(fx.poller.try_poll().is_none());
        drop(held);
        assert!(fx.poller.try_poll().is_some());
        let diag = fx.poller.diagnostics();
        assert_eq!(diag.polls_suppressed, 1);
        assert_eq!(diag.polls_completed, 1);
    }

    #[test]
    fn subscribers_receive_publishes_in_order() {
        let fx = Fixture::new();
        let rx = fx.poller.subscribe();
        fx.set_running(Some(2));
        fx.poller.poll();
        fx.runner.respond("doctor", "all systems go");
        fx.poller.run_health_check();
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(first.running);
        assert_eq!(first.health_status, HealthStatus::Unknown);
        assert_eq!(second.health_status, HealthStatus::Healthy);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let fx = Fixture::new();
        drop(fx.poller.subscribe());
        fx.poller.poll();
        assert!(fx.poller.subscribers.lock().is_empty());
    }

    #[test]
    fn version_queried_once_then_refreshed_after_start() {
        let fx = Fixture::new();
        fx.runner.respond("--version", "2026.2.1\n");
        fx.poller.poll();
        fx.poller.poll();
        assert_eq!(fx.runner.count_containing("--version"), 1);
        assert_eq!(fx.poller.current().version, "2026.2.1");

        fx.poller.start();
        assert_eq!(fx.runner.count_containing("--version"), 2);
    }

    #[test]
    fn concurrent_polls_never_interleave_notifications() {
        let fx = Fixture::new();
        fx.set_running(Some(12));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let poller = Arc::clone(&fx.poller);
                std::thread::spawn(move || {
                    poller.poll();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(fx.sink.events(), vec![true]);
    }
}
