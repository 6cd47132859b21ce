//! Top-level CLI definition and dispatch.

use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::cli::report::{
    AutostartReport, StatusReport, format_autostart_report, format_status_line,
    format_status_report,
};
use crate::core::config::Config;
use crate::core::diagnostics::Diagnostics;
use crate::core::errors::{GwError, Result};
use crate::core::snapshot::Snapshot;
use crate::daemon::autostart::AutoStartRegistrar;
use crate::daemon::loop_main::PollLoop;
use crate::daemon::notifications::{DesktopNotifier, NotificationSink};
use crate::daemon::poller::StatusPoller;
use crate::daemon::signals::ShutdownFlag;
use crate::logger::{LogConfig, LogFormat};
use crate::platform::{CommandRunner, ShellRunner};

/// Gateway monitor: liveness, logs, resources, and control for a local gateway service.
#[derive(Debug, Parser)]
#[command(name = "gwmon", version, about)]
pub struct Cli {
    /// Settings file (TOML). Defaults to the per-user config directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write log events as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also append log events to this file.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll once and show gateway status.
    Status {
        /// Include the recent log tail.
        #[arg(long)]
        logs: bool,
    },
    /// Poll continuously and print a line per change until interrupted.
    Watch,
    /// Launch the gateway and report the observed state.
    Start,
    /// Stop the gateway and report the observed state.
    Stop,
    /// Stop then start the gateway.
    Restart,
    /// Run the gateway's diagnostic command and classify the result.
    Health,
    /// Show the tail of today's gateway log.
    Logs {
        /// Maximum number of lines.
        #[arg(short = 'n', long, value_name = "N")]
        lines: Option<usize>,
        /// Keep only lines containing this text (case-insensitive).
        #[arg(long, value_name = "TEXT")]
        filter: Option<String>,
    },
    /// Manage login-time autostart registration.
    Autostart {
        /// What to do with the descriptor.
        #[command(subcommand)]
        action: AutostartAction,
    },
    /// Print the resolved settings as TOML.
    Config,
    /// Print the local dashboard address.
    Dashboard,
    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `autostart` actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum AutostartAction {
    /// Write and activate the login descriptor.
    Enable,
    /// Deactivate and remove the login descriptor.
    Disable,
    /// Report whether the descriptor exists.
    Status,
}

impl Cli {
    /// Logging settings implied by the global flags.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::for_verbosity(self.verbose);
        if self.log_json {
            config.format = LogFormat::Json;
        }
        config.file.clone_from(&self.log_file);
        config
    }
}

impl AutostartAction {
    const fn name(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Status => "status",
        }
    }
}

/// Wired-up components for one invocation.
struct Runtime {
    config: Config,
    diagnostics: Arc<Diagnostics>,
    runner: Arc<dyn CommandRunner>,
}

impl Runtime {
    fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let config = Config::load(path)?;
        let diagnostics = Arc::new(Diagnostics::new());
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new(
            config.poll.command_timeout(),
            Arc::clone(&diagnostics),
        ));
        Ok(Self {
            config,
            diagnostics,
            runner,
        })
    }

    fn poller(&self) -> Arc<StatusPoller> {
        let sink: Arc<dyn NotificationSink> = Arc::new(DesktopNotifier::from_config(
            &self.config.notifications,
            Arc::clone(&self.runner),
            Arc::clone(&self.diagnostics),
        ));
        Arc::new(StatusPoller::new(
            &self.config,
            Arc::clone(&self.runner),
            sink,
            Arc::clone(&self.diagnostics),
        ))
    }

    /// A poller whose transitions are not announced. One-shot commands see
    /// the gateway for the first time, so every "transition" would be noise.
    fn quiet_poller(&self) -> Arc<StatusPoller> {
        Arc::new(StatusPoller::new(
            &self.config,
            Arc::clone(&self.runner),
            Arc::new(SilentSink),
            Arc::clone(&self.diagnostics),
        ))
    }
}

struct SilentSink;

impl NotificationSink for SilentSink {
    fn notify(&self, running: bool) {
        tracing::debug!(running, "transition not announced in one-shot mode");
    }
}

/// Dispatch CLI commands.
///
/// # Errors
/// Returns an error only for unusable settings or terminal IO failures;
/// monitor operations themselves never fail.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "gwmon", &mut io::stdout());
            return Ok(());
        }
        Command::Config => {
            let config = Config::load(cli.config.as_deref())?;
            emit(&config.to_toml()?);
            return Ok(());
        }
        _ => {}
    }

    let rt = Runtime::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Status { logs } => {
            let poller = rt.quiet_poller();
            let snap = poller.poll();
            render_status(cli.json, &poller, &snap, *logs)
        }
        Command::Watch => watch(cli.json, &rt),
        Command::Start => {
            let poller = rt.quiet_poller();
            poller.poll();
            let snap = poller.start();
            render_status(cli.json, &poller, &snap, false)
        }
        Command::Stop => {
            let poller = rt.quiet_poller();
            poller.poll();
            let snap = poller.stop();
            render_status(cli.json, &poller, &snap, false)
        }
        Command::Restart => {
            let poller = rt.quiet_poller();
            poller.poll();
            let snap = poller.restart();
            render_status(cli.json, &poller, &snap, false)
        }
        Command::Health => {
            let poller = rt.quiet_poller();
            poller.poll();
            let snap = poller.run_health_check();
            render_status(cli.json, &poller, &snap, false)
        }
        Command::Logs { lines, filter } => {
            let poller = rt.quiet_poller();
            let max = lines.unwrap_or(rt.config.poll.max_log_lines);
            let tail = poller.logs().read_tail_filtered(max, filter.as_deref());
            if cli.json {
                emit(&to_json(&tail)?);
            } else {
                for line in &tail {
                    println!("{line}");
                }
            }
            Ok(())
        }
        Command::Autostart { action } => autostart(cli.json, &rt, *action),
        Command::Dashboard => {
            let url = &rt.config.gateway.dashboard_url;
            if cli.json {
                emit(&to_json(&serde_json::json!({ "dashboard_url": url }))?);
            } else {
                println!("{url}");
            }
            Ok(())
        }
        Command::Completions { .. } | Command::Config => Ok(()),
    }
}

fn render_status(json: bool, poller: &StatusPoller, snap: &Snapshot, logs: bool) -> Result<()> {
    let report = StatusReport::new(
        snap,
        poller.flags(),
        poller.dashboard_url(),
        poller.diagnostics(),
        Local::now(),
    );
    if json {
        emit(&to_json(&report)?);
    } else {
        print!("{}", format_status_report(&report, logs));
    }
    Ok(())
}

fn autostart(json: bool, rt: &Runtime, action: AutostartAction) -> Result<()> {
    let registrar = AutoStartRegistrar::from_config(
        &rt.config,
        Arc::clone(&rt.runner),
        Arc::clone(&rt.diagnostics),
    );
    let registered = match action {
        AutostartAction::Enable => registrar.register(),
        AutostartAction::Disable => registrar.unregister(),
        AutostartAction::Status => registrar.is_registered(),
    };
    let report = AutostartReport {
        action: action.name(),
        flavor: registrar.flavor(),
        marker_path: registrar.marker_path().to_path_buf(),
        registered,
    };
    if json {
        emit(&to_json(&report)?);
    } else {
        print!("{}", format_autostart_report(&report));
    }
    Ok(())
}

/// Foreground poll loop. Prints one line per published snapshot (JSON lines
/// with `--json`) until SIGINT or SIGTERM.
fn watch(json: bool, rt: &Runtime) -> Result<()> {
    let shutdown = ShutdownFlag::new();
    shutdown.install()?;

    let poller = rt.poller();
    let updates = poller.subscribe();
    let poll_loop = PollLoop::spawn(Arc::clone(&poller), rt.config.poll.interval())?;
    let tick = std::time::Duration::from_millis(200);

    while !shutdown.is_set() {
        match updates.recv_timeout(tick) {
            Ok(snap) => emit(&watch_line(json, &snap, Local::now())?),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                return Err(GwError::ChannelClosed {
                    component: "poller subscription",
                });
            }
        }
    }

    tracing::info!("shutdown requested; stopping poll loop");
    poll_loop.stop();
    Ok(())
}

/// One `watch` output line: compact JSON or the human status line.
fn watch_line(json: bool, snap: &Snapshot, now: chrono::DateTime<Local>) -> Result<String> {
    if json {
        Ok(serde_json::to_string(snap)?)
    } else {
        Ok(format_status_line(snap, now))
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Print a line, ignoring a closed stdout (e.g. piped into `head`).
fn emit(text: &str) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", text.trim_end_matches('\n'));
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn logs_flags_parse() {
        let cli = Cli::parse_from(["gwmon", "logs", "-n", "5", "--filter", "error"]);
        match cli.command {
            Command::Logs { lines, filter } => {
                assert_eq!(lines, Some(5));
                assert_eq!(filter.as_deref(), Some("error"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["gwmon", "status", "--json", "-vv"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn log_flags_shape_log_config() {
        let cli = Cli::parse_from(["gwmon", "-v", "--log-json", "--log-file", "/tmp/g.log", "status"]);
        let config = cli.log_config();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/g.log")));
    }

    #[test]
    fn autostart_requires_action() {
        assert!(Cli::try_parse_from(["gwmon", "autostart"]).is_err());
        let cli = Cli::parse_from(["gwmon", "autostart", "enable"]);
        assert!(matches!(
            cli.command,
            Command::Autostart {
                action: AutostartAction::Enable
            }
        ));
    }

    #[test]
    fn watch_json_is_one_line_per_snapshot() {
        let now = Local::now();
        let snap = Snapshot {
            running: true,
            pid: Some(4242),
            started_at: Some(now),
            version: "2026.1.5".to_string(),
            channels: vec![crate::core::snapshot::Channel::new("Telegram", true)],
            log_lines: vec!["first".to_string(), "second".to_string()],
            health_details: vec!["ok".to_string()],
            ..Snapshot::default()
        };
        let line = watch_line(true, &snap, now).unwrap();
        assert!(!line.contains('\n'));
        let parsed: Snapshot = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.pid, Some(4242));
        assert_eq!(parsed.log_lines.len(), 2);
    }
}
