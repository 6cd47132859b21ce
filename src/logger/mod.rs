//! Structured logging for gwmon.
//!
//! `tracing` events go to stderr in either a human format or JSON lines, with
//! an optional append-only file copy. `RUST_LOG` overrides the configured
//! level.
//!
//! Field names used across the crate:
//! - `command`: command line handed to the runner
//! - `pid`: gateway process id
//! - `running`: observed run state
//! - `code`: `GwError` code on degradation paths

use std::io;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub level: String,
    /// Event rendering.
    pub format: LogFormat,
    /// Optional append-mode copy of every event.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LogConfig {
    /// Map a `-v` count onto a level: 0 → warn, 1 → info, 2 → debug, more → trace.
    #[must_use]
    pub fn for_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            level: level.to_string(),
            ..Self::default()
        }
    }
}

/// Error type for logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// [`init_logging`] already ran in this process.
    #[error("logging already initialized")]
    AlreadyInitialized,

    /// The level is not a known filter name.
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    /// The log file or its directory could not be created.
    #[error("failed to create log file: {0}")]
    FileCreate(#[from] io::Error),

    /// Another global subscriber is already installed.
    #[error("failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    let existed = parent.exists();
    std::fs::create_dir_all(parent)?;
    #[cfg(unix)]
    if !existed {
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

fn open_log_file(path: &Path) -> io::Result<std::fs::File> {
    ensure_parent_dir(path)?;
    let existed = path.exists();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    #[cfg(unix)]
    if !existed {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(file)
}

fn validate_level(level: &str) -> Result<(), LogError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(()),
        _ => Err(LogError::InvalidLevel(level.to_string())),
    }
}

/// Install the global subscriber. Call once at startup; later calls return
/// [`LogError::AlreadyInitialized`].
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }
    validate_level(&config.level)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let file_writer = config.file.as_deref().map(open_log_file).transpose()?;

    match config.format {
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .with_ansi(true),
            );
            if let Some(file) = file_writer {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_target(true)
                    .with_ansi(false);
                tracing::subscriber::set_global_default(subscriber.with(file_layer))?;
            } else {
                tracing::subscriber::set_global_default(subscriber)?;
            }
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .json()
                    .with_timer(SystemTime)
                    .with_writer(io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            );
            if let Some(file) = file_writer {
                let file_layer = fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_timer(SystemTime)
                    .with_target(true)
                    .flatten_event(true);
                tracing::subscriber::set_global_default(subscriber.with(file_layer))?;
            } else {
                tracing::subscriber::set_global_default(subscriber)?;
            }
        }
    }

    let _ = LOGGING_INITIALIZED.set(true);
    tracing::debug!(
        log_level = %config.level,
        log_format = %config.format,
        log_file = ?config.file,
        "logging initialized"
    );
    Ok(())
}
