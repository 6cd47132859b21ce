//! Enabled messaging channels from the gateway's JSON configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::core::diagnostics::{Degradation, Diagnostics};
use crate::core::errors::{GwError, Result};
use crate::core::snapshot::Channel;

/// Recognized channels in display priority order: (config key, display name).
pub const KNOWN_CHANNELS: [(&str, &str); 2] = [("whatsapp", "WhatsApp"), ("signal", "Signal")];

/// Reads `plugins.entries.<key>.enabled` for each known channel.
pub struct ConfigReader {
    path: PathBuf,
    diagnostics: Arc<Diagnostics>,
}

impl ConfigReader {
    /// Reader for the gateway configuration file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            path: path.into(),
            diagnostics,
        }
    }

    /// Configuration file being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Channels present in the configuration, in [`KNOWN_CHANNELS`] order.
    ///
    /// An unreadable or malformed file yields an empty list; a missing or
    /// non-boolean `enabled` leaves that channel out. Absence means "not
    /// configured", never an error.
    #[must_use]
    pub fn read_channels(&self) -> Vec<Channel> {
        match load_document(&self.path) {
            Ok(document) => channels_from(&document),
            Err(err) => {
                self.diagnostics.record(Degradation::ConfigUnavailable);
                tracing::debug!(code = err.code(), error = %err, "gateway config unavailable");
                Vec::new()
            }
        }
    }
}

fn load_document(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| GwError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Extract known channels from an already-parsed document.
#[must_use]
pub fn channels_from(document: &Value) -> Vec<Channel> {
    KNOWN_CHANNELS
        .iter()
        .filter_map(|(key, name)| {
            document
                .pointer(&format!("/plugins/entries/{key}/enabled"))
                .and_then(Value::as_bool)
                .map(|enabled| Channel::new(*name, enabled))
        })
        .collect()
}
