//! Shared helpers for CLI integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use gateway_monitor::core::config::Config;
use gateway_monitor::daemon::notifications::NotifyBackend;

/// Captured result of one `gwmon` invocation.
pub struct CliResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Transcript of the invocation, kept for failure messages.
    pub log_path: PathBuf,
}

fn case_dir(case_name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_TARGET_TMPDIR"))
        .join("cli_cases")
        .join(case_name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create case dir");
    dir
}

/// Run the built binary with `args` and record a transcript.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CliResult {
    let dir = case_dir(case_name);
    run_in(&dir, args)
}

/// Write `config` to a per-case settings file and run with `--config` pointing
/// at it.
pub fn run_cli_case_with_config(case_name: &str, config: &Config, args: &[&str]) -> CliResult {
    let dir = case_dir(case_name);
    let config_path = dir.join("gwmon.toml");
    fs::write(&config_path, config.to_toml().expect("render config")).expect("write config");
    let config_arg = config_path.to_string_lossy().into_owned();
    let mut full: Vec<&str> = vec!["--config", &config_arg];
    full.extend_from_slice(args);
    run_in(&dir, &full)
}

fn run_in(dir: &Path, args: &[&str]) -> CliResult {
    let output = Command::new(env!("CARGO_BIN_EXE_gwmon"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("run gwmon");
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let log_path = dir.join("transcript.log");
    let transcript = format!(
        "args: {args:?}\nstatus: {}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
        output.status
    );
    fs::write(&log_path, transcript).expect("write transcript");
    CliResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Settings that touch nothing outside `root`: a process pattern that never
/// matches, echo-based gateway commands, and notifications off.
pub fn sandbox_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.gateway.process_pattern = "gwmon-integration-no-such-process".to_string();
    config.gateway.version_command = "echo 9.9.9-test".to_string();
    config.gateway.start_command = "true".to_string();
    config.gateway.stop_command = "true".to_string();
    config.gateway.health_command = "echo 'all checks passed'".to_string();
    config.gateway.dashboard_url = "http://127.0.0.1:65000".to_string();
    config.paths.gateway_config = root.join("openclaw.json");
    config.paths.log_dir = root.join("logs");
    config.poll.start_grace_ms = 50;
    config.poll.stop_grace_ms = 50;
    config.poll.settle_probe_ms = 10;
    config.autostart.marker_path = Some(root.join("autostart").join("gw.service"));
    config.notifications.enabled = false;
    config.notifications.backend = NotifyBackend::None;
    config
}

/// Path of today's log file under `sandbox_config(root)`.
pub fn today_log(root: &Path) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d");
    root.join("logs").join(format!("openclaw-{date}.log"))
}
