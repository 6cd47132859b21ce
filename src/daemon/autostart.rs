//! "Run at login" registration for the gateway.
//!
//! The descriptor file is the source of truth: registration state is always
//! re-read from disk after a mutation, never assumed from having attempted
//! one. Activation failures are logged and counted, not raised.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::Config;
use crate::core::diagnostics::{Degradation, Diagnostics};
use crate::core::errors::{GwError, Result};
use crate::platform::{CommandRunner, shell_quote};

/// OS service-registration mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutostartFlavor {
    /// Per-user LaunchAgent plist (`launchctl`).
    Launchd,
    /// Per-user systemd unit (`systemctl --user`).
    Systemd,
}

impl Default for AutostartFlavor {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl AutostartFlavor {
    /// launchd on macOS, systemd elsewhere.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::Launchd
        } else {
            Self::Systemd
        }
    }

    /// Standard per-user descriptor directory.
    #[must_use]
    pub fn default_marker_dir(self, home: &Path) -> PathBuf {
        match self {
            Self::Launchd => home.join("Library").join("LaunchAgents"),
            Self::Systemd => home.join(".config").join("systemd").join("user"),
        }
    }

    /// Descriptor file name for `label`.
    #[must_use]
    pub fn marker_file_name(self, label: &str) -> String {
        match self {
            Self::Launchd => format!("{label}.plist"),
            Self::Systemd => format!("{label}.service"),
        }
    }
}

impl std::fmt::Display for AutostartFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Launchd => "launchd",
            Self::Systemd => "systemd",
        })
    }
}

/// Owns the auto-start descriptor. Mutations are serialized.
pub struct AutoStartRegistrar {
    runner: Arc<dyn CommandRunner>,
    diagnostics: Arc<Diagnostics>,
    flavor: AutostartFlavor,
    label: String,
    marker_path: PathBuf,
    start_command: String,
    gate: Mutex<()>,
}

impl AutoStartRegistrar {
    /// Registrar for an explicit descriptor path and start command.
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        diagnostics: Arc<Diagnostics>,
        flavor: AutostartFlavor,
        label: impl Into<String>,
        marker_path: impl Into<PathBuf>,
        start_command: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            diagnostics,
            flavor,
            label: label.into(),
            marker_path: marker_path.into(),
            start_command: start_command.into(),
            gate: Mutex::new(()),
        }
    }

    /// Registrar wired from the `[autostart]` and `[gateway]` settings.
    #[must_use]
    pub fn from_config(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self::new(
            runner,
            diagnostics,
            config.autostart.flavor,
            config.autostart.label.clone(),
            config.autostart.resolved_marker_path(),
            config.gateway.start_command.clone(),
        )
    }

    /// Where the descriptor lives.
    #[must_use]
    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Service manager this registrar targets.
    #[must_use]
    pub const fn flavor(&self) -> AutostartFlavor {
        self.flavor
    }

    /// Whether the descriptor file exists right now.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.marker_path.is_file()
    }

    /// Write the descriptor (idempotently) and activate it. Returns the
    /// observed registration state afterwards.
    pub fn register(&self) -> bool {
        let _serialized = self.gate.lock();
        match self.write_descriptor() {
            Ok(()) => {
                let output = self.runner.run(&self.activate_command());
                if !output.trim().is_empty() {
                    tracing::debug!(output = output.trim(), "autostart activation output");
                }
            }
            Err(err) => {
                self.diagnostics.record(Degradation::AutostartFailure);
                tracing::warn!(code = err.code(), error = %err, "autostart descriptor write failed");
            }
        }
        let observed = self.is_registered();
        tracing::info!(registered = observed, path = %self.marker_path.display(), "autostart register");
        observed
    }

    /// Deactivate and delete the descriptor. Returns the observed
    /// registration state afterwards.
    pub fn unregister(&self) -> bool {
        let _serialized = self.gate.lock();
        if self.is_registered() {
            let output = self.runner.run(&self.deactivate_command());
            if !output.trim().is_empty() {
                tracing::debug!(output = output.trim(), "autostart deactivation output");
            }
        }
        if let Err(err) = remove_if_present(&self.marker_path) {
            self.diagnostics.record(Degradation::AutostartFailure);
            tracing::warn!(code = err.code(), error = %err, "autostart descriptor removal failed");
        }
        let observed = self.is_registered();
        tracing::info!(registered = observed, path = %self.marker_path.display(), "autostart unregister");
        observed
    }

    /// Descriptor contents for the configured flavor.
    #[must_use]
    pub fn render_descriptor(&self) -> String {
        match self.flavor {
            AutostartFlavor::Launchd => launchd_plist(&self.label, &self.start_command),
            AutostartFlavor::Systemd => systemd_unit(&self.label, &self.start_command),
        }
    }

    fn write_descriptor(&self) -> Result<()> {
        let contents = self.render_descriptor();
        if std::fs::read_to_string(&self.marker_path).is_ok_and(|existing| existing == contents) {
            return Ok(());
        }
        if let Some(parent) = self.marker_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GwError::io(parent, e))?;
        }
        std::fs::write(&self.marker_path, contents).map_err(|e| GwError::io(&self.marker_path, e))
    }

    fn activate_command(&self) -> String {
        let path = shell_quote(&self.marker_path.to_string_lossy());
        match self.flavor {
            AutostartFlavor::Launchd => format!("launchctl load -w {path}"),
            AutostartFlavor::Systemd => format!(
                "systemctl --user daemon-reload; systemctl --user enable {}",
                shell_quote(&self.unit_name())
            ),
        }
    }

    fn deactivate_command(&self) -> String {
        let path = shell_quote(&self.marker_path.to_string_lossy());
        match self.flavor {
            AutostartFlavor::Launchd => format!("launchctl unload -w {path}"),
            AutostartFlavor::Systemd => {
                format!("systemctl --user disable {}", shell_quote(&self.unit_name()))
            }
        }
    }

    fn unit_name(&self) -> String {
        self.marker_path
            .file_name()
            .map_or_else(
                || self.flavor.marker_file_name(&self.label),
                |name| name.to_string_lossy().into_owned(),
            )
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GwError::io(path, e)),
    }
}

fn launchd_plist(label: &str, start_command: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>/bin/sh</string>
        <string>-lc</string>
        <string>{command}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        label = escape_xml(label),
        command = escape_xml(start_command),
    )
}

fn systemd_unit(label: &str, start_command: &str) -> String {
    format!(
        "[Unit]\n\
         Description=Start gateway at login ({label})\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         RemainAfterExit=yes\n\
         ExecStart=/bin/sh -lc \"{command}\"\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n",
        command = escape_systemd(start_command),
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn escape_systemd(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('%', "%%")
        .replace('$', "$$")
}
