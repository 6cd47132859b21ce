//! Desktop notifications for gateway run/stop transitions.
//!
//! The payload is binary (running or stopped). Delivery shells out to the
//! platform notifier; failures are logged and counted, never raised.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::config::NotificationsConfig;
use crate::core::diagnostics::{Degradation, Diagnostics};
use crate::platform::{CommandRunner, shell_join};

/// Receives edge-triggered run-state changes from the poller.
pub trait NotificationSink: Send + Sync {
    /// Called exactly once per observed transition, with the new value.
    fn notify(&self, running: bool);
}

/// Which notifier program to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyBackend {
    /// Pick by target OS.
    #[default]
    Auto,
    /// `osascript` (`display notification`).
    MacOs,
    /// `notify-send`.
    Linux,
    /// Notifications off.
    None,
}

impl NotifyBackend {
    /// Replace `Auto` with the concrete backend for this build target.
    #[must_use]
    pub const fn resolve(self) -> Self {
        match self {
            Self::Auto => {
                if cfg!(target_os = "macos") {
                    Self::MacOs
                } else if cfg!(target_os = "linux") {
                    Self::Linux
                } else {
                    Self::None
                }
            }
            other => other,
        }
    }
}

impl std::fmt::Display for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::None => "none",
        })
    }
}

/// A notifier invocation: program plus raw (unquoted) arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyCommand {
    /// Executable name.
    pub program: String,
    /// Arguments, quoted only when the command line is joined.
    pub args: Vec<String>,
}

/// Title and body for a run-state change.
#[must_use]
pub const fn message_for(running: bool) -> (&'static str, &'static str) {
    if running {
        ("Gateway Running", "The gateway process is up.")
    } else {
        ("Gateway Stopped", "The gateway process is no longer running.")
    }
}

/// Build the notifier command for a backend. `None` for backends that do
/// nothing (`none`, or an unresolved `auto`).
#[must_use]
pub fn build_command(
    backend: NotifyBackend,
    title: &str,
    body: &str,
    critical: bool,
    sound: bool,
) -> Option<NotifyCommand> {
    match backend {
        NotifyBackend::MacOs => {
            let mut script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(body),
                escape_applescript(title)
            );
            if sound {
                script.push_str(" sound name \"default\"");
            }
            Some(NotifyCommand {
                program: "osascript".to_string(),
                args: vec!["-e".to_string(), script],
            })
        }
        NotifyBackend::Linux => {
            let urgency = if critical { "critical" } else { "normal" };
            Some(NotifyCommand {
                program: "notify-send".to_string(),
                args: vec![
                    "--app-name=gwmon".to_string(),
                    format!("--urgency={urgency}"),
                    title.to_string(),
                    body.to_string(),
                ],
            })
        }
        NotifyBackend::Auto | NotifyBackend::None => None,
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Sends run/stop alerts through the platform notifier.
pub struct DesktopNotifier {
    runner: Arc<dyn CommandRunner>,
    diagnostics: Arc<Diagnostics>,
    backend: NotifyBackend,
    enabled: bool,
    sound: bool,
}

impl DesktopNotifier {
    /// Notifier for the configured backend, `Auto` resolved.
    #[must_use]
    pub fn from_config(
        config: &NotificationsConfig,
        runner: Arc<dyn CommandRunner>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            runner,
            diagnostics,
            backend: config.backend.resolve(),
            enabled: config.enabled,
            sound: config.sound,
        }
    }

    /// Whether notifications are enabled and a concrete backend exists.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.enabled && !matches!(self.backend, NotifyBackend::None | NotifyBackend::Auto)
    }

    /// The resolved backend.
    #[must_use]
    pub const fn backend(&self) -> NotifyBackend {
        self.backend
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, running: bool) {
        let (title, body) = message_for(running);
        tracing::info!(running, title, "gateway run state changed");
        if !self.is_available() {
            return;
        }
        let Some(cmd) = build_command(self.backend, title, body, !running, self.sound) else {
            return;
        };
        // Both notifiers are silent on success.
        let output = self.runner.run(&shell_join(&cmd.program, &cmd.args));
        if !output.trim().is_empty() {
            self.diagnostics.record(Degradation::NotificationFailure);
            tracing::warn!(
                backend = %self.backend,
                output = output.trim(),
                "notification delivery reported output"
            );
        }
    }
}
