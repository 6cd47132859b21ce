//! External command execution with bounded waits.
//!
//! [`CommandRunner::run`] never fails: spawn errors, timeouts, and non-UTF-8
//! output all come back as an empty string. Callers infer failure from the
//! output alone.

use std::io::Read as _;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;

use crate::core::diagnostics::{Degradation, Diagnostics};
use crate::core::errors::{GwError, Result};

/// Spacing of exit checks once the output pipe has closed.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executes shell command lines on behalf of every other component.
pub trait CommandRunner: Send + Sync {
    /// Run through a shell, wait, and return merged stdout+stderr. Empty on
    /// any failure.
    fn run(&self, command_line: &str) -> String;

    /// Launch without waiting or capturing output. Failures are logged only.
    fn spawn_detached(&self, command_line: &str);
}

/// `sh -c` runner with a per-invocation timeout.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
    diagnostics: Arc<Diagnostics>,
}

impl ShellRunner {
    /// Runner whose every invocation, exit included, is bounded by `timeout`.
    /// Degradations are counted on `diagnostics`.
    #[must_use]
    pub fn new(timeout: Duration, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            timeout,
            diagnostics,
        }
    }

    /// Fallible core of [`CommandRunner::run`].
    ///
    /// # Errors
    /// [`GwError::CommandTimeout`] when output or exit misses the deadline;
    /// spawn, read, and UTF-8 failures map to their own variants.
    pub fn try_run(&self, command_line: &str) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        // `exec 2>&1` folds stderr into stdout for every command in the line,
        // not just the last one.
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(format!("exec 2>&1; {command_line}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        isolate_process_group(&mut command);

        let mut child = command.spawn().map_err(|e| GwError::CommandSpawn {
            command: command_line.to_string(),
            details: e.to_string(),
        })?;

        let Some(mut stdout) = child.stdout.take() else {
            terminate(&mut child);
            return Err(GwError::Runtime {
                details: "child stdout was not captured".to_string(),
            });
        };

        let (tx, rx) = crossbeam_channel::bounded::<std::io::Result<Vec<u8>>>(1);
        std::thread::Builder::new()
            .name("gwmon-cmd-reader".to_string())
            .spawn(move || {
                let mut buf = Vec::new();
                let result = stdout.read_to_end(&mut buf).map(|_| buf);
                let _ = tx.send(result);
            })
            .map_err(|e| GwError::Runtime {
                details: format!("failed to spawn output reader: {e}"),
            })?;

        let bytes = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                terminate(&mut child);
                return Err(GwError::Runtime {
                    details: format!("reading output of `{command_line}` failed: {e}"),
                });
            }
            Err(RecvTimeoutError::Timeout) => {
                terminate(&mut child);
                return Err(self.timed_out(command_line));
            }
            Err(RecvTimeoutError::Disconnected) => {
                terminate(&mut child);
                return Err(GwError::ChannelClosed {
                    component: "command-reader",
                });
            }
        };

        // The pipe can close while the shell keeps running (output redirected
        // elsewhere), so the exit wait shares the same deadline.
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    terminate(&mut child);
                    return Err(self.timed_out(command_line));
                }
                Ok(None) => std::thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => {
                    terminate(&mut child);
                    return Err(GwError::Runtime {
                        details: format!("wait failed: {e}"),
                    });
                }
            }
        };
        if !status.success() {
            tracing::debug!(command = command_line, %status, "command exited unsuccessfully");
        }
        String::from_utf8(bytes).map_err(|_| GwError::InvalidOutput {
            command: command_line.to_string(),
        })
    }

    fn timed_out(&self, command_line: &str) -> GwError {
        GwError::CommandTimeout {
            command: command_line.to_string(),
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command_line: &str) -> String {
        match self.try_run(command_line) {
            Ok(output) => output,
            Err(err) => {
                let kind = match err {
                    GwError::CommandTimeout { .. } => Degradation::CommandTimeout,
                    GwError::InvalidOutput { .. } => Degradation::InvalidUtf8,
                    _ => Degradation::CommandFailure,
                };
                self.diagnostics.record(kind);
                tracing::warn!(code = err.code(), error = %err, "command degraded to empty output");
                String::new()
            }
        }
    }

    fn spawn_detached(&self, command_line: &str) {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group, so a terminal interrupt aimed at the monitor
        // does not reach the gateway.
        isolate_process_group(&mut command);
        let spawned = command.spawn();
        match spawned {
            Ok(mut child) => {
                tracing::debug!(command = command_line, pid = child.id(), "launched detached");
                // Reap in the background so the shell never lingers as a zombie.
                let reaper = std::thread::Builder::new()
                    .name("gwmon-reaper".to_string())
                    .spawn(move || {
                        let _ = child.wait();
                    });
                if let Err(e) = reaper {
                    tracing::debug!(error = %e, "could not spawn reaper thread");
                }
            }
            Err(e) => {
                self.diagnostics.record(Degradation::CommandFailure);
                tracing::warn!(command = command_line, error = %e, "detached launch failed");
            }
        }
    }
}

/// Quote one argument for `sh`: single quotes, with embedded single quotes
/// spliced as `'\''`.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for ch in arg.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Join a program and its arguments into one quoted shell command line.
#[must_use]
pub fn shell_join(program: &str, args: &[String]) -> String {
    let mut line = shell_quote(program);
    for arg in args {
        line.push(' ');
        line.push_str(&shell_quote(arg));
    }
    line
}

#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt as _;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

/// Kill the child and everything it started, then reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        if let Ok(raw) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(raw), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
