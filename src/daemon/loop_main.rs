//! Periodic poll driver.
//!
//! A background thread ticks at the configured interval and calls
//! [`StatusPoller::try_poll`], so a slow cycle suppresses the next tick
//! instead of queueing behind it. One poll runs immediately at startup.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, select};

use crate::core::errors::{GwError, Result};
use crate::daemon::poller::StatusPoller;

/// Handle to the running poll thread. Dropping it stops the loop.
pub struct PollLoop {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PollLoop {
    /// Start ticking every `interval`.
    pub fn spawn(poller: Arc<StatusPoller>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(GwError::InvalidConfig {
                details: "poll interval must be non-zero".to_string(),
            });
        }
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("gwmon-poll".to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                poller.try_poll();
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            poller.try_poll();
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                tracing::debug!("poll loop exited");
            })
            .map_err(|e| GwError::Runtime {
                details: format!("failed to spawn poll thread: {e}"),
            })?;
        tracing::info!(interval_ms = interval.as_millis(), "poll loop started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for the in-flight cycle to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel, which also wakes select!.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("poll thread panicked");
            }
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
