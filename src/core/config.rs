//! Monitor settings: gateway commands, file locations, poll cadence, auto-start
//! and notification preferences. Loaded from TOML with per-section defaults.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{GwError, Result};
use crate::daemon::autostart::AutostartFlavor;
use crate::daemon::notifications::NotifyBackend;

/// Complete monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub paths: PathsConfig,
    pub poll: PollConfig,
    pub autostart: AutostartConfig,
    pub notifications: NotificationsConfig,
}

/// How to find and drive the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Substring matched against full process command lines. Names the
    /// supervised child process, not the control binary.
    pub process_pattern: String,
    pub version_command: String,
    /// Launched detached; the command is expected to background the gateway.
    pub start_command: String,
    pub stop_command: String,
    pub health_command: String,
    /// Exposed to the presentation layer only; never fetched.
    pub dashboard_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            process_pattern: "openclaw-gateway".to_string(),
            version_command: "openclaw --version".to_string(),
            start_command: "openclaw gateway".to_string(),
            stop_command: "openclaw gateway stop".to_string(),
            health_command: "openclaw doctor".to_string(),
            dashboard_url: "http://127.0.0.1:18789".to_string(),
        }
    }
}

/// Gateway-owned files the monitor reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// JSON document holding `plugins.entries.<channel>.enabled`.
    pub gateway_config: PathBuf,
    pub log_dir: PathBuf,
    /// Log files are named `<log_service>-<YYYY-MM-DD>.<log_extension>`.
    pub log_service: String,
    pub log_extension: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            gateway_config: home_dir().join(".openclaw").join("openclaw.json"),
            log_dir: PathBuf::from("/tmp/openclaw"),
            log_service: "openclaw".to_string(),
            log_extension: "log".to_string(),
        }
    }
}

/// Poll cadence, command bounds, and grace periods (all milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub command_timeout_ms: u64,
    pub max_log_lines: usize,
    pub start_grace_ms: u64,
    pub stop_grace_ms: u64,
    /// Probe spacing while waiting out a grace period.
    pub settle_probe_ms: u64,
    pub health_detail_lines: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            command_timeout_ms: 10_000,
            max_log_lines: 50,
            start_grace_ms: 3_000,
            stop_grace_ms: 2_000,
            settle_probe_ms: 500,
            health_detail_lines: 10,
        }
    }
}

impl PollConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    #[must_use]
    pub const fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }

    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    #[must_use]
    pub const fn settle_probe(&self) -> Duration {
        Duration::from_millis(self.settle_probe_ms)
    }
}

/// "Run at login" registration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutostartConfig {
    /// Service label; also the descriptor file stem.
    pub label: String,
    pub flavor: AutostartFlavor,
    /// Overrides the platform's descriptor location.
    pub marker_path: Option<PathBuf>,
}

impl Default for AutostartConfig {
    fn default() -> Self {
        Self {
            label: "ai.openclaw.gateway".to_string(),
            flavor: AutostartFlavor::platform_default(),
            marker_path: None,
        }
    }
}

impl AutostartConfig {
    /// Resolved descriptor path: the override, or the flavor's standard
    /// per-user location.
    #[must_use]
    pub fn resolved_marker_path(&self) -> PathBuf {
        self.marker_path.clone().unwrap_or_else(|| {
            self.flavor
                .default_marker_dir(&home_dir())
                .join(self.flavor.marker_file_name(&self.label))
        })
    }
}

/// Desktop notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub backend: NotifyBackend,
    pub sound: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: NotifyBackend::Auto,
            sound: false,
        }
    }
}

impl Config {
    /// Default settings file location (`<config-dir>/gwmon/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| home_dir().join(".config"))
            .join("gwmon")
            .join("config.toml")
    }

    /// Load settings.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// tried and a missing file falls back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(GwError::MissingConfig {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => {
                let path = Self::default_path();
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "no settings file; using defaults");
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| GwError::io(path, e))?;
        Self::from_toml(&raw)
    }

    /// Parse settings from a TOML string (no validation).
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Render the resolved settings as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the poller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let poll = &self.poll;
        let zero_fields = [
            ("poll.interval_ms", poll.interval_ms),
            ("poll.command_timeout_ms", poll.command_timeout_ms),
            ("poll.settle_probe_ms", poll.settle_probe_ms),
        ];
        if let Some((name, _)) = zero_fields.iter().find(|(_, value)| *value == 0) {
            return Err(GwError::InvalidConfig {
                details: format!("{name} must be greater than zero"),
            });
        }
        if self.gateway.process_pattern.trim().is_empty() {
            return Err(GwError::InvalidConfig {
                details: "gateway.process_pattern must not be empty".to_string(),
            });
        }
        if self.paths.log_service.is_empty() {
            return Err(GwError::InvalidConfig {
                details: "paths.log_service must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [poll]
            interval_ms = 1500

            [gateway]
            process_pattern = "my-gateway"
            "#,
        )
        .unwrap();
        assert_eq!(config.poll.interval(), Duration::from_millis(1500));
        assert_eq!(config.poll.max_log_lines, PollConfig::default().max_log_lines);
        assert_eq!(config.gateway.process_pattern, "my-gateway");
        assert_eq!(config.gateway.stop_command, GatewayConfig::default().stop_command);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        config.poll.interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "GW-1001");
        assert!(err.to_string().contains("poll.interval_ms"));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let mut config = Config::default();
        config.gateway.process_pattern = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(Some(&tmp.path().join("absent.toml"))).unwrap_err();
        assert_eq!(err.code(), "GW-1002");
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[paths]\nlog_service = \"gw\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.paths.log_service, "gw");
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[poll\ninterval_ms = ").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "GW-1003");
    }

    #[test]
    fn toml_output_parses_back() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[gateway]"));
        assert_eq!(Config::from_toml(&rendered).unwrap(), config);
    }

    #[test]
    fn marker_override_wins() {
        let autostart = AutostartConfig {
            marker_path: Some(PathBuf::from("/tmp/custom.plist")),
            ..AutostartConfig::default()
        };
        assert_eq!(
            autostart.resolved_marker_path(),
            PathBuf::from("/tmp/custom.plist")
        );
    }

    #[test]
    fn marker_default_uses_label() {
        let autostart = AutostartConfig::default();
        let path = autostart.resolved_marker_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&autostart.label));
    }
}
