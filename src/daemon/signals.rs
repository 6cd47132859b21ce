//! Shutdown flag for the foreground `watch` loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::errors::{GwError, Result};

/// Set once SIGINT or SIGTERM arrives.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// An unset flag with no handlers installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route SIGINT and SIGTERM onto this flag.
    pub fn install(&self) -> Result<()> {
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&self.flag)).map_err(|e| {
                GwError::Runtime {
                    details: format!("failed to register handler for signal {signal}: {e}"),
                }
            })?;
        }
        Ok(())
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag without a signal.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}
