//! GW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, GwError>;

/// Top-level error type for the gateway monitor.
///
/// Monitor operations never hand these to their callers; they are raised by
/// component internals and absorbed at the component boundary, or surface at
/// the outer edges (settings loading, CLI).
#[derive(Debug, Error)]
pub enum GwError {
    #[error("[GW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[GW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[GW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[GW-2001] command timed out after {timeout_ms} ms: {command}")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("[GW-2002] command could not be launched: {command}: {details}")]
    CommandSpawn { command: String, details: String },

    #[error("[GW-2003] command produced non-UTF-8 output: {command}")]
    InvalidOutput { command: String },

    #[error("[GW-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[GW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[GW-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[GW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl GwError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "GW-1001",
            Self::MissingConfig { .. } => "GW-1002",
            Self::ConfigParse { .. } => "GW-1003",
            Self::CommandTimeout { .. } => "GW-2001",
            Self::CommandSpawn { .. } => "GW-2002",
            Self::InvalidOutput { .. } => "GW-2003",
            Self::Serialization { .. } => "GW-2101",
            Self::Io { .. } => "GW-3002",
            Self::ChannelClosed { .. } => "GW-3003",
            Self::Runtime { .. } => "GW-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::CommandTimeout { .. }
                | Self::CommandSpawn { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for GwError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for GwError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for GwError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
